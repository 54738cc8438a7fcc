//! # bndl
//!
//! Reader/writer for the Bundle archive format used by Criterion Games,
//! notably *Burnout Paradise*.
//!
//! A bundle aggregates many typed, optionally zlib-compressed binary
//! resources into one file. Every resource is identified by a 32-bit hash
//! of its name and carries up to three parallel data blocks, one per memory
//! pool (main memory plus two graphics pools). Resources can reference each
//! other through dependency records, and authoring builds embed an XML
//! debug-name table mapping hashes back to names.
//!
//! ## Supported layouts
//!
//! - **`bnd2`** (modern): revision 2, used by the PC release. Little-endian
//!   on PC; console variants are read via their platform word.
//! - **`bndl`** (legacy): revisions 3-5 across PC, Xbox 360, and PS3.
//!   Consoles are big-endian, and each platform carries its own number of
//!   data-block slots which are remapped onto the canonical three.
//!
//! Both layouts load into the same in-memory model, so inspection and
//! editing code never branches on the container version.
//!
//! ## Example
//!
//! ```no_run
//! use bndl::{Bundle, MagicVersion, Platform};
//!
//! let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
//! bundle.load("vehicles.bundle")?;
//! for id in bundle.list_resource_ids() {
//!     if let Some(info) = bundle.get_debug_info(id) {
//!         println!("{id:08x} {}", info.name);
//!     }
//! }
//! # Ok::<(), bndl::Error>(())
//! ```

mod binary;
mod bnd2;
mod bndl;
mod bundle;
pub mod error;
mod rst;
pub mod types;

pub use bundle::{hash_resource_name, Bundle, IntoResourceId};
pub use error::{Error, ErrorKind, Result};
pub use types::{
    flags, Block, DebugInfo, Dependency, MagicVersion, Platform, Resource, ResourceData,
    ResourceInfo, ResourceType,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn reload(bundle: &Bundle) -> Bundle {
        let bytes = bundle.save_bytes().expect("save failed");
        let mut out = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        out.load_bytes(&bytes).expect("reload failed");
        out
    }

    fn block0(data: &[u8], alignment: u32) -> ResourceData {
        ResourceData {
            blocks: [Some(data.to_vec()), None, None],
            alignments: [alignment, 1, 1],
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn empty_modern_bundle_roundtrips() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::UNUSED_1 | flags::UNUSED_2);

        let reloaded = reload(&bundle);
        assert_eq!(reloaded.magic_version(), MagicVersion::Bnd2);
        assert_eq!(reloaded.revision_number(), 2);
        assert_eq!(reloaded.platform(), Platform::Pc);
        assert_eq!(reloaded.flags(), flags::UNUSED_1 | flags::UNUSED_2);
        assert!(reloaded.list_resource_ids().is_empty());
        assert!(reloaded.debug_entries().is_empty());
    }

    #[test]
    fn single_text_resource_roundtrips() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::UNUSED_1 | flags::UNUSED_2);
        bundle
            .add_resource(
                0x12345678,
                &block0(b"hello world", 4),
                ResourceType::TEXT_FILE,
            )
            .unwrap();

        let reloaded = reload(&bundle);
        assert_eq!(
            reloaded.get_binary(0x12345678, 0).unwrap().as_deref(),
            Some(b"hello world".as_slice())
        );
        assert_eq!(
            reloaded.get_resource_type(0x12345678),
            Some(ResourceType::TEXT_FILE)
        );
        let info = reloaded.get_info(0x12345678).unwrap();
        assert_eq!(info.number_of_dependencies, 0);
        assert_eq!(info.dependencies_offset, 0);
    }

    #[test]
    fn resource_names_hash_case_insensitively() {
        assert_eq!(
            hash_resource_name("GRAPHICS/CAR.DAT"),
            hash_resource_name("graphics/car.dat")
        );
        assert_eq!(
            hash_resource_name("GRAPHICS/CAR.DAT"),
            crc32fast::hash(b"graphics/car.dat")
        );
    }

    #[test]
    fn names_and_ids_are_interchangeable() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle
            .add_resource("graphics/car.dat", &block0(b"data", 1), ResourceType::RASTER)
            .unwrap();

        let id = hash_resource_name("graphics/car.dat");
        assert_eq!(
            bundle.get_resource_type("GRAPHICS/CAR.DAT"),
            Some(ResourceType::RASTER)
        );
        assert_eq!(bundle.get_resource_type(id), Some(ResourceType::RASTER));
        assert_eq!(
            bundle.get_binary("Graphics/Car.DAT", 0).unwrap().as_deref(),
            Some(b"data".as_slice())
        );
    }

    #[test]
    fn inline_dependencies_roundtrip() {
        let deps = vec![
            Dependency {
                resource_id: 0xAAAA,
                internal_offset: 0x04,
            },
            Dependency {
                resource_id: 0xBBBB,
                internal_offset: 0x10,
            },
        ];
        let payload = vec![0xABu8; 32];
        let data = ResourceData {
            blocks: [Some(payload.clone()), None, None],
            alignments: [16, 1, 1],
            dependencies: deps.clone(),
        };

        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::UNUSED_1 | flags::UNUSED_2);
        bundle
            .add_resource(0x00C0FFEE, &block0(&payload, 16), ResourceType::MODEL)
            .unwrap();
        bundle.replace_resource(0x00C0FFEE, &data).unwrap();

        let info = bundle.get_info(0x00C0FFEE).unwrap();
        assert_eq!(info.dependencies_offset, 32);
        assert_eq!(info.number_of_dependencies, 2);

        let reloaded = reload(&bundle);
        let got = reloaded.get_data(0x00C0FFEE).unwrap().unwrap();
        assert_eq!(got.dependencies, deps);
        assert_eq!(got.blocks[0].as_deref(), Some(payload.as_slice()));
        assert_eq!(got.alignments[0], 16);
    }

    #[test]
    fn dependency_offset_lands_after_padded_payload() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        let data = ResourceData {
            blocks: [Some(vec![1u8; 16]), None, None],
            alignments: [4, 1, 1],
            dependencies: vec![Dependency {
                resource_id: 0x1,
                internal_offset: 0,
            }],
        };
        bundle.add_resource(0x10, &data, ResourceType::MODEL).unwrap();
        assert_eq!(bundle.get_info(0x10).unwrap().dependencies_offset, 16);

        let reloaded = reload(&bundle);
        let got = reloaded.get_data(0x10).unwrap().unwrap();
        assert_eq!(got.blocks[0].as_deref(), Some([1u8; 16].as_slice()));
        assert_eq!(got.dependencies, data.dependencies);
    }

    #[test]
    fn compressed_payload_roundtrips() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::COMPRESSED | flags::UNUSED_1 | flags::UNUSED_2);
        let payload = vec![0x55u8; 4096];
        bundle
            .add_resource(0x200, &block0(&payload, 16), ResourceType::RASTER)
            .unwrap();

        let stored = &bundle.resources[&0x200].blocks[0];
        assert!(stored.compressed_size > 0 && stored.compressed_size < 4096);
        assert_eq!(stored.uncompressed_size, 4096);

        let reloaded = reload(&bundle);
        assert_eq!(reloaded.get_binary(0x200, 0).unwrap().unwrap(), payload);
        assert!(reloaded.resources[&0x200].blocks[0].compressed_size < 4096);
    }

    #[test]
    fn corrupt_compressed_payload_is_reported() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::COMPRESSED | flags::UNUSED_1 | flags::UNUSED_2);
        bundle
            .add_resource(0x5, &block0(&[1, 2, 3, 4], 1), ResourceType::RASTER)
            .unwrap();

        let block = &mut bundle.resources.get_mut(&0x5).unwrap().blocks[0];
        for byte in block.data.as_mut().unwrap().iter_mut() {
            *byte = 0xFF;
        }

        let err = bundle.get_binary(0x5, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptPayload);
    }

    #[test]
    fn resource_with_all_blocks_empty_roundtrips() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::UNUSED_1 | flags::UNUSED_2);
        bundle
            .add_resource(0x99, &ResourceData::default(), ResourceType::ID_LIST)
            .unwrap();

        let reloaded = reload(&bundle);
        assert_eq!(reloaded.list_resource_ids(), vec![0x99]);
        assert_eq!(reloaded.get_binary(0x99, 0).unwrap(), None);
        let got = reloaded.get_data(0x99).unwrap().unwrap();
        assert_eq!(got.blocks, [None, None, None]);
        assert_eq!(got.alignments, [1, 1, 1]);
    }

    #[test]
    fn replace_with_own_data_is_identity() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::UNUSED_1 | flags::UNUSED_2);
        let data = ResourceData {
            blocks: [Some(vec![4u8; 48]), Some(vec![5u8; 7]), None],
            alignments: [16, 4, 1],
            dependencies: vec![Dependency {
                resource_id: 0x31,
                internal_offset: 0x20,
            }],
        };
        bundle.add_resource(0x30, &data, ResourceType::MODEL).unwrap();

        let before = bundle.get_data(0x30).unwrap().unwrap();
        bundle.replace_resource(0x30, &before).unwrap();
        let after = bundle.get_data(0x30).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn api_misuse_is_rejected() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle
            .add_resource(0x1, &ResourceData::default(), ResourceType::RASTER)
            .unwrap();

        assert!(matches!(
            bundle.add_resource(0x1, &ResourceData::default(), ResourceType::RASTER),
            Err(Error::DuplicateResource(0x1))
        ));
        assert!(matches!(
            bundle.replace_resource(0x2, &ResourceData::default()),
            Err(Error::MissingResource(0x2))
        ));
        assert!(matches!(
            bundle.add_resource(0u32, &ResourceData::default(), ResourceType::RASTER),
            Err(Error::ZeroResourceId)
        ));

        bundle.add_debug_info(0x1, "a", "b").unwrap();
        assert!(matches!(
            bundle.add_debug_info(0x1, "c", "d"),
            Err(Error::DuplicateDebugInfo(0x1))
        ));

        let too_many = ResourceData {
            dependencies: (0..=u16::MAX as u32)
                .map(|i| Dependency {
                    resource_id: i + 1,
                    internal_offset: 0,
                })
                .collect(),
            ..ResourceData::default()
        };
        let err = bundle.replace_resource(0x1, &too_many).unwrap_err();
        assert!(matches!(err, Error::TooManyDependencies(65536)));
        assert_eq!(err.kind(), ErrorKind::Logic);

        let bad_alignment = ResourceData {
            blocks: [Some(vec![0u8; 4]), None, None],
            alignments: [3, 1, 1],
            dependencies: Vec::new(),
        };
        assert!(matches!(
            bundle.replace_resource(0x1, &bad_alignment),
            Err(Error::BadAlignment(3))
        ));
    }

    #[test]
    fn resource_listings_are_sorted_and_grouped() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle
            .add_resource(0x30, &ResourceData::default(), ResourceType::RASTER)
            .unwrap();
        bundle
            .add_resource(0x10, &ResourceData::default(), ResourceType::MODEL)
            .unwrap();
        bundle
            .add_resource(0x20, &ResourceData::default(), ResourceType::RASTER)
            .unwrap();

        assert_eq!(bundle.list_resource_ids(), vec![0x10, 0x20, 0x30]);
        let by_type = bundle.list_resource_ids_by_type();
        assert_eq!(by_type[&ResourceType::RASTER], vec![0x20, 0x30]);
        assert_eq!(by_type[&ResourceType::MODEL], vec![0x10]);
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        let err = bundle.load_bytes(b"XXXX\x00\x00\x00\x00").unwrap_err();
        assert!(matches!(err, Error::InvalidMagic(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn modern_revision_must_be_two() {
        let bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        let mut bytes = bundle.save_bytes().unwrap();
        bytes[4] = 3;

        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        let err = reloaded.load_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedRevision(3)));
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn legacy_revision_range_is_enforced() {
        for bad in [2u32, 6] {
            let mut bundle = Bundle::new(MagicVersion::Bndl, Platform::Pc);
            bundle.set_revision_number(5);
            let mut bytes = bundle.save_bytes().unwrap();
            bytes[4] = bad as u8;

            let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
            let err = reloaded.load_bytes(&bytes).unwrap_err();
            assert!(matches!(err, Error::UnsupportedRevision(r) if r == bad));
        }
    }

    #[test]
    fn modern_save_is_a_fixpoint_of_its_own_reload() {
        let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        bundle.set_flags(flags::UNUSED_1 | flags::UNUSED_2 | flags::HAS_RESOURCE_STRING_TABLE);
        bundle.add_debug_info(0x444, "vehicles/car", "Model").unwrap();
        let data = ResourceData {
            blocks: [Some(vec![7u8; 20]), Some(vec![9u8; 300]), None],
            alignments: [16, 128, 1],
            dependencies: vec![Dependency {
                resource_id: 0x445,
                internal_offset: 8,
            }],
        };
        bundle.add_resource(0x444, &data, ResourceType::MODEL).unwrap();
        bundle
            .add_resource(0x445, &block0(b"other", 4), ResourceType::RASTER)
            .unwrap();

        let first = bundle.save_bytes().unwrap();
        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        reloaded.load_bytes(&first).unwrap();
        let second = reloaded.save_bytes().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn legacy_empty_bundle_roundtrips() {
        let bundle = Bundle::new(MagicVersion::Bndl, Platform::Pc);
        let first = bundle.save_bytes().unwrap();

        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        reloaded.load_bytes(&first).unwrap();
        assert_eq!(reloaded.magic_version(), MagicVersion::Bndl);
        assert_eq!(reloaded.revision_number(), 4);
        assert!(reloaded.list_resource_ids().is_empty());
        assert_eq!(first, reloaded.save_bytes().unwrap());
    }

    #[test]
    fn legacy_ps3_bundle_roundtrips_big_endian() {
        let mut bundle = Bundle::new(MagicVersion::Bndl, Platform::Ps3);
        bundle.set_revision_number(5);
        let data_a = ResourceData {
            blocks: [Some(vec![1u8; 24]), Some(vec![2u8; 100]), None],
            alignments: [8, 4096, 1],
            dependencies: vec![
                Dependency {
                    resource_id: 0xB,
                    internal_offset: 4,
                },
                Dependency {
                    resource_id: 0xC,
                    internal_offset: 12,
                },
            ],
        };
        bundle.add_resource(0xA, &data_a, ResourceType::MODEL).unwrap();
        let data_b = ResourceData {
            blocks: [None, None, Some(vec![3u8; 17])],
            alignments: [1, 1, 2],
            dependencies: Vec::new(),
        };
        bundle.add_resource(0xB, &data_b, ResourceType::RASTER).unwrap();
        bundle.add_debug_info(0xA, "a", "Model").unwrap();

        let first = bundle.save_bytes().unwrap();
        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        reloaded.load_bytes(&first).unwrap();

        assert_eq!(reloaded.magic_version(), MagicVersion::Bndl);
        assert_eq!(reloaded.platform(), Platform::Ps3);
        assert_eq!(reloaded.revision_number(), 5);
        let got_a = reloaded.get_data(0xA).unwrap().unwrap();
        assert_eq!(got_a.blocks[0].as_deref(), Some(vec![1u8; 24].as_slice()));
        assert_eq!(got_a.blocks[1].as_deref(), Some(vec![2u8; 100].as_slice()));
        assert_eq!(got_a.blocks[2], None);
        assert_eq!(got_a.alignments, [8, 4096, 1]);
        assert_eq!(got_a.dependencies, data_a.dependencies);
        let got_b = reloaded.get_data(0xB).unwrap().unwrap();
        assert_eq!(got_b.blocks[2].as_deref(), Some(vec![3u8; 17].as_slice()));
        assert_eq!(reloaded.get_debug_info(0xA).unwrap().name, "a");

        let second = reloaded.save_bytes().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn legacy_xbox360_bundle_roundtrips() {
        let mut bundle = Bundle::new(MagicVersion::Bndl, Platform::Xbox360);
        bundle.set_revision_number(3);
        bundle
            .add_resource(0x77, &block0(b"xbox payload", 4), ResourceType::LUA_CODE)
            .unwrap();

        let first = bundle.save_bytes().unwrap();
        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        reloaded.load_bytes(&first).unwrap();
        assert_eq!(reloaded.platform(), Platform::Xbox360);
        assert_eq!(reloaded.revision_number(), 3);
        assert_eq!(
            reloaded.get_binary(0x77, 0).unwrap().as_deref(),
            Some(b"xbox payload".as_slice())
        );
        assert_eq!(first, reloaded.save_bytes().unwrap());
    }

    #[test]
    fn legacy_compressed_bundle_roundtrips() {
        let mut bundle = Bundle::new(MagicVersion::Bndl, Platform::Pc);
        bundle.set_flags(flags::COMPRESSED);
        let payload = vec![0x55u8; 4096];
        let data = ResourceData {
            blocks: [Some(payload.clone()), Some(b"gpu".to_vec()), None],
            alignments: [16, 4, 1],
            dependencies: vec![Dependency {
                resource_id: 0x9,
                internal_offset: 0,
            }],
        };
        bundle.add_resource(0x8, &data, ResourceType::RASTER).unwrap();

        let bytes = bundle.save_bytes().unwrap();
        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        reloaded.load_bytes(&bytes).unwrap();

        assert!(reloaded.flags() & flags::COMPRESSED != 0);
        assert_eq!(reloaded.get_binary(0x8, 0).unwrap().unwrap(), payload);
        assert_eq!(
            reloaded.get_binary(0x8, 1).unwrap().as_deref(),
            Some(b"gpu".as_slice())
        );
        let got = reloaded.get_data(0x8).unwrap().unwrap();
        assert_eq!(got.dependencies, data.dependencies);
        assert_eq!(got.alignments[0], 16);
        assert!(reloaded.resources[&0x8].blocks[0].compressed_size < 4096);
    }

    #[test]
    fn legacy_compression_needs_revision_four() {
        let mut bundle = Bundle::new(MagicVersion::Bndl, Platform::Pc);
        bundle.set_revision_number(3);
        bundle.set_flags(flags::COMPRESSED);
        let err = bundle.save_bytes().unwrap_err();
        assert!(matches!(err, Error::CompressionUnsupported));
        assert_eq!(err.kind(), ErrorKind::Logic);
    }

    #[test]
    fn legacy_debug_table_quirks_are_repaired() {
        let broken = "</ResourceStringTable>\n\t<Resource id=\"000000ff\" type=\"T\" name=\"N\"/></ResourceStringTable>\n\t";
        let mut payload = Vec::new();
        payload.extend_from_slice(&(broken.len() as u32).to_le_bytes());
        payload.extend_from_slice(broken.as_bytes());

        let mut bundle = Bundle::new(MagicVersion::Bndl, Platform::Pc);
        bundle.set_revision_number(3);
        bundle
            .add_resource(0xC039284A, &block0(&payload, 4), ResourceType::TEXT_FILE)
            .unwrap();

        let bytes = bundle.save_bytes().unwrap();
        let mut reloaded = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
        reloaded.load_bytes(&bytes).unwrap();

        let info = reloaded.get_debug_info(0xFF).unwrap();
        assert_eq!(info.name, "N");
        assert_eq!(info.type_name, "T");
        assert!(reloaded.get_resource_type(0xC039284A).is_none());
        assert!(reloaded.flags() & flags::HAS_RESOURCE_STRING_TABLE != 0);
    }
}
