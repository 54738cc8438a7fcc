//! The bundle core: the in-memory resource model and the public surface.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::binary::{ByteReader, ByteWriter};
use crate::error::{Error, Result};
use crate::types::{
    flags, Block, DebugInfo, Dependency, MagicVersion, Platform, Resource, ResourceData,
    ResourceInfo, ResourceType,
};

/// The size field keeps its top nibble for the alignment.
const MAX_BLOCK_SIZE: u32 = 0x0FFF_FFFF;

/// Hash a resource name to its 32-bit ID.
///
/// Names are ASCII-lowercased and then run through the zlib CRC-32, so IDs
/// and names are interchangeable lookup keys and lookups are
/// case-insensitive.
pub fn hash_resource_name(name: &str) -> u32 {
    let lowered: Vec<u8> = name.bytes().map(|b| b.to_ascii_lowercase()).collect();
    crc32fast::hash(&lowered)
}

/// Accepted anywhere the API identifies a resource: either the 32-bit ID
/// itself or the resource name, which is hashed with
/// [`hash_resource_name`].
pub trait IntoResourceId {
    fn into_resource_id(self) -> u32;
}

impl IntoResourceId for u32 {
    fn into_resource_id(self) -> u32 {
        self
    }
}

impl IntoResourceId for &str {
    fn into_resource_id(self) -> u32 {
        hash_resource_name(self)
    }
}

impl IntoResourceId for &String {
    fn into_resource_id(self) -> u32 {
        hash_resource_name(self)
    }
}

/// A Bundle archive: typed, optionally compressed resources plus their
/// cross-references and an optional debug-name table.
///
/// A bundle is either built up empty (for writing from scratch) or
/// populated wholesale by [`load`](Bundle::load). The container layout
/// ([`MagicVersion`]) is fixed at construction or load time.
pub struct Bundle {
    pub(crate) magic_version: MagicVersion,
    pub(crate) revision_number: u32,
    pub(crate) platform: Platform,
    pub(crate) flags: u32,
    /// Ascending ID order is the canonical emission order on save.
    pub(crate) resources: BTreeMap<u32, Resource>,
    pub(crate) debug_info: BTreeMap<u32, DebugInfo>,
    /// Out-of-line dependency lists. Only used by the legacy layout; the
    /// modern layout keeps dependencies appended to block 0 of the owner.
    pub(crate) dependencies: BTreeMap<u32, Vec<Dependency>>,
}

impl Bundle {
    /// Create an empty bundle.
    ///
    /// The revision defaults to 2 for `bnd2` and 4 for `bndl`; legacy
    /// bundles can be switched to revisions 3-5 with
    /// [`set_revision_number`](Bundle::set_revision_number).
    pub fn new(magic_version: MagicVersion, platform: Platform) -> Self {
        let revision_number = match magic_version {
            MagicVersion::Bnd2 => 2,
            MagicVersion::Bndl => 4,
        };
        Self {
            magic_version,
            revision_number,
            platform,
            flags: 0,
            resources: BTreeMap::new(),
            debug_info: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    pub fn magic_version(&self) -> MagicVersion {
        self.magic_version
    }

    pub fn revision_number(&self) -> u32 {
        self.revision_number
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    pub fn set_revision_number(&mut self, revision_number: u32) {
        self.revision_number = revision_number;
    }

    /// Read a bundle file, replacing the current contents.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = fs::read(path)?;
        self.load_bytes(&bytes)
    }

    /// Parse a bundle from memory, dispatching on the file magic.
    pub fn load_bytes(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = ByteReader::new(data);
        let magic = reader.read_bytes(4)?;
        if magic == b"bnd2" {
            self.load_bnd2(&mut reader)
        } else if magic == b"bndl" {
            self.load_bndl(&mut reader)
        } else {
            let mut m = [0u8; 4];
            m.copy_from_slice(magic);
            Err(Error::InvalidMagic(m))
        }
    }

    /// Write the bundle to a file in its own layout.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.save_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize the bundle to memory.
    pub fn save_bytes(&self) -> Result<Vec<u8>> {
        match self.magic_version {
            MagicVersion::Bnd2 => self.save_bnd2(),
            MagicVersion::Bndl => self.save_bndl(),
        }
    }

    /// Look up a resource's debug-name entry.
    pub fn get_debug_info<K: IntoResourceId>(&self, key: K) -> Option<DebugInfo> {
        self.debug_info.get(&key.into_resource_id()).cloned()
    }

    /// Look up a resource's type tag.
    pub fn get_resource_type<K: IntoResourceId>(&self, key: K) -> Option<ResourceType> {
        let id = key.into_resource_id();
        self.resources.get(&id).map(|r| r.info.resource_type)
    }

    /// Snapshot of a resource's metadata.
    pub fn get_info<K: IntoResourceId>(&self, key: K) -> Option<ResourceInfo> {
        let id = key.into_resource_id();
        self.resources.get(&id).map(|r| r.info)
    }

    /// Decode a whole resource: uncompressed payloads, alignments, and the
    /// dependency list.
    ///
    /// In modern bundles the dependency records sit at the tail of block 0;
    /// the returned block 0 is truncated to exclude them. In legacy bundles
    /// the dependencies come from the out-of-line lists.
    pub fn get_data<K: IntoResourceId>(&self, key: K) -> Result<Option<ResourceData>> {
        let id = key.into_resource_id();
        let Some(resource) = self.resources.get(&id) else {
            return Ok(None);
        };

        let mut data = ResourceData::default();
        for slot in 0..3 {
            data.blocks[slot] = self.decode_block(id, resource, slot)?;
            data.alignments[slot] = resource.blocks[slot].uncompressed_alignment;
        }

        match self.magic_version {
            MagicVersion::Bndl => {
                data.dependencies = self.dependencies.get(&id).cloned().unwrap_or_default();
            }
            MagicVersion::Bnd2 => {
                if resource.info.dependencies_offset != 0 {
                    if let Some(mut block0) = data.blocks[0].take() {
                        let offset = resource.info.dependencies_offset as usize;
                        if offset > block0.len() {
                            return Err(Error::Malformed {
                                section: "dependency list",
                                offset,
                            });
                        }
                        let mut reader = ByteReader::new(&block0);
                        reader.set_big_endian(self.platform.is_big_endian());
                        reader.seek(offset)?;
                        for _ in 0..resource.info.number_of_dependencies {
                            data.dependencies.push(Dependency::read(&mut reader)?);
                        }
                        block0.truncate(offset);
                        data.blocks[0] = Some(block0);
                    }
                }
            }
        }

        Ok(Some(data))
    }

    /// Decode a single block's uncompressed payload.
    ///
    /// `None` when the resource does not exist or the slot is empty.
    pub fn get_binary<K: IntoResourceId>(&self, key: K, block: usize) -> Result<Option<Vec<u8>>> {
        let id = key.into_resource_id();
        let Some(resource) = self.resources.get(&id) else {
            return Ok(None);
        };
        if block >= 3 {
            return Ok(None);
        }
        self.decode_block(id, resource, block)
    }

    /// Insert a new resource.
    pub fn add_resource<K: IntoResourceId>(
        &mut self,
        key: K,
        data: &ResourceData,
        resource_type: ResourceType,
    ) -> Result<()> {
        let id = key.into_resource_id();
        if id == 0 {
            return Err(Error::ZeroResourceId);
        }
        if self.resources.contains_key(&id) {
            return Err(Error::DuplicateResource(id));
        }
        let resource = self.encode_resource(data, resource_type, 0)?;
        self.store_dependencies(id, data);
        self.resources.insert(id, resource);
        Ok(())
    }

    /// Replace an existing resource's payloads and dependencies.
    ///
    /// The type tag and checksum carry over from the existing resource; the
    /// checksum's derivation is unknown, so it is never recomputed.
    pub fn replace_resource<K: IntoResourceId>(&mut self, key: K, data: &ResourceData) -> Result<()> {
        let id = key.into_resource_id();
        let Some(existing) = self.resources.get(&id) else {
            return Err(Error::MissingResource(id));
        };
        let checksum = existing.info.checksum;
        let resource_type = existing.info.resource_type;
        let resource = self.encode_resource(data, resource_type, checksum)?;
        self.store_dependencies(id, data);
        self.resources.insert(id, resource);
        Ok(())
    }

    /// Insert a debug-name entry.
    pub fn add_debug_info<K: IntoResourceId>(
        &mut self,
        key: K,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Result<()> {
        let id = key.into_resource_id();
        if self.debug_info.contains_key(&id) {
            return Err(Error::DuplicateDebugInfo(id));
        }
        self.debug_info.insert(
            id,
            DebugInfo {
                name: name.into(),
                type_name: type_name.into(),
            },
        );
        Ok(())
    }

    /// All resource IDs in ascending order.
    pub fn list_resource_ids(&self) -> Vec<u32> {
        self.resources.keys().copied().collect()
    }

    /// Resource IDs grouped by type tag, ascending within each group.
    pub fn list_resource_ids_by_type(&self) -> BTreeMap<ResourceType, Vec<u32>> {
        let mut map: BTreeMap<ResourceType, Vec<u32>> = BTreeMap::new();
        for (&id, resource) in &self.resources {
            map.entry(resource.info.resource_type).or_default().push(id);
        }
        map
    }

    /// The debug-name table.
    pub fn debug_entries(&self) -> &BTreeMap<u32, DebugInfo> {
        &self.debug_info
    }

    fn decode_block(&self, id: u32, resource: &Resource, slot: usize) -> Result<Option<Vec<u8>>> {
        let block = &resource.blocks[slot];
        let Some(stored) = &block.data else {
            return Ok(None);
        };
        if block.compressed_size == 0 {
            return Ok(Some(stored.clone()));
        }

        let mut inflated = Vec::with_capacity(block.uncompressed_size as usize);
        let mut decoder = ZlibDecoder::new(stored.as_slice());
        decoder
            .read_to_end(&mut inflated)
            .map_err(|source| Error::Decompress {
                id,
                block: slot,
                source,
            })?;
        if inflated.len() != block.uncompressed_size as usize {
            return Err(Error::DecompressedSizeMismatch {
                id,
                block: slot,
                expected: block.uncompressed_size,
                actual: inflated.len(),
            });
        }
        Ok(Some(inflated))
    }

    /// Build the stored form of a resource from its decoded view.
    fn encode_resource(
        &self,
        data: &ResourceData,
        resource_type: ResourceType,
        checksum: u32,
    ) -> Result<Resource> {
        if data.dependencies.len() > u16::MAX as usize {
            return Err(Error::TooManyDependencies(data.dependencies.len()));
        }

        let compressed = self.flags & flags::COMPRESSED != 0;
        let mut resource = Resource {
            info: ResourceInfo {
                checksum,
                dependencies_offset: 0,
                resource_type,
                number_of_dependencies: data.dependencies.len() as u16,
            },
            blocks: [Block::default(), Block::default(), Block::default()],
        };

        for slot in 0..3 {
            let payload = data.blocks[slot].as_deref().unwrap_or(&[]);
            let inline_deps = slot == 0
                && self.magic_version == MagicVersion::Bnd2
                && !data.dependencies.is_empty();
            if payload.is_empty() && !inline_deps {
                continue;
            }

            let alignment = data.alignments[slot];
            if !alignment.is_power_of_two() || alignment.trailing_zeros() > 15 {
                return Err(Error::BadAlignment(alignment));
            }

            let mut raw = payload.to_vec();
            if inline_deps {
                // Dependency records trail the payload on a 16-byte boundary.
                raw.resize(raw.len().div_ceil(16) * 16, 0);
                resource.info.dependencies_offset = raw.len() as u32;
                let mut w = ByteWriter::new();
                w.set_big_endian(self.platform.is_big_endian());
                for dep in &data.dependencies {
                    dep.write(&mut w);
                }
                raw.extend_from_slice(&w.into_inner());
            }

            if raw.len() > MAX_BLOCK_SIZE as usize {
                return Err(Error::BlockTooLarge(raw.len()));
            }

            let block = &mut resource.blocks[slot];
            block.uncompressed_size = raw.len() as u32;
            block.uncompressed_alignment = alignment;
            if compressed {
                let deflated = compress_best(&raw)?;
                block.compressed_size = deflated.len() as u32;
                block.data = Some(deflated);
            } else {
                block.data = Some(raw);
            }
        }

        Ok(resource)
    }

    fn store_dependencies(&mut self, id: u32, data: &ResourceData) {
        if self.magic_version == MagicVersion::Bndl {
            if data.dependencies.is_empty() {
                self.dependencies.remove(&id);
            } else {
                self.dependencies.insert(id, data.dependencies.clone());
            }
        }
    }
}

/// Deflate with the zlib wrapper at best compression, matching the game's
/// own packer settings.
pub(crate) fn compress_best(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
