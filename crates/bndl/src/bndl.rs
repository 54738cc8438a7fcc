//! Legacy (`bndl`) container layout.
//!
//! The legacy layout predates the three-slot model: each platform carries
//! its own number of data blocks (PC 4, Xbox 360 5, PS3 6), of which only
//! three ever hold data. [`remap_slot`] translates between a platform's
//! native slot indices and the canonical three-slot model; the remaining
//! slots must be empty on disk.
//!
//! Dependencies live in a separate section rather than inline, and the
//! debug-name table is smuggled in as an ordinary text resource under a
//! well-known ID.

use crate::binary::{ByteReader, ByteWriter};
use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::rst;
use crate::types::{
    flags, Block, Dependency, MagicVersion, Platform, Resource, ResourceInfo, ResourceType,
};

/// ID under which the game's tooling stores the debug-name table resource.
pub(crate) const DEBUG_RESOURCE_ID: u32 = 0xC039_284A;

/// ID given to the synthetic debug-name resource while writing. Sorts last,
/// matching where the tooling appends it.
const DEBUG_WRITE_ID: u32 = 0xFFFF_FFFF;

/// Number of native data-block slots in a platform's legacy header.
pub(crate) fn legacy_block_count(platform: Platform) -> usize {
    match platform {
        Platform::Pc => 4,
        Platform::Xbox360 => 5,
        Platform::Ps3 => 6,
    }
}

/// Map a platform's native slot index onto the canonical three-slot model.
/// `None` marks slots that are always empty on that platform.
pub(crate) fn remap_slot(platform: Platform, legacy_slot: usize) -> Option<usize> {
    const PC: [Option<usize>; 4] = [Some(0), Some(1), Some(2), None];
    const XBOX360: [Option<usize>; 5] = [Some(0), None, Some(1), Some(2), None];
    const PS3: [Option<usize>; 6] = [Some(0), None, None, None, Some(1), Some(2)];
    match platform {
        Platform::Pc => PC[legacy_slot],
        Platform::Xbox360 => XBOX360[legacy_slot],
        Platform::Ps3 => PS3[legacy_slot],
    }
}

/// The platform word's position depends on the platform's own block count,
/// so detection probes each candidate position for its platform's word.
const PLATFORM_WORD_PROBES: [(usize, Platform); 3] = [
    (0x4C, Platform::Pc),
    (0x58, Platform::Xbox360),
    (0x64, Platform::Ps3),
];

fn detect_platform(reader: &ByteReader<'_>) -> Result<Platform> {
    for (offset, platform) in PLATFORM_WORD_PROBES {
        let mut probe = reader.clone();
        probe.set_big_endian(false);
        if probe.seek(offset).is_err() {
            continue;
        }
        if let Ok(word) = probe.read_u32() {
            if word == platform as u32 {
                return Ok(platform);
            }
        }
    }
    Err(Error::PlatformNotDetected)
}

impl Bundle {
    /// Parse a `bndl` bundle. The reader sits just past the magic.
    pub(crate) fn load_bndl(&mut self, reader: &mut ByteReader<'_>) -> Result<()> {
        // Endianness follows the platform, which has to be sniffed before
        // any multi-byte field can be trusted.
        let platform = detect_platform(reader)?;
        reader.set_big_endian(platform.is_big_endian());
        reader.seek(4)?;

        let revision = reader.read_u32()?;
        if !(3..=5).contains(&revision) {
            return Err(Error::UnsupportedRevision(revision));
        }
        let num_entries = reader.read_u32()?;

        let block_count = legacy_block_count(platform);
        let mut region_sizes = vec![0usize; block_count];
        for size in &mut region_sizes {
            *size = reader.read_u32()? as usize;
            reader.skip(4)?; // allocator alignment, not needed for reading
        }
        reader.skip(block_count * 4)?; // resident memory addresses

        let id_list_offset = reader.read_u32()? as usize;
        let id_table_offset = reader.read_u32()? as usize;
        reader.skip(4)?; // import-table offset; entries carry absolute offsets
        let data_offset = reader.read_u32()? as usize;

        // The platform word is little-endian even in big-endian bundles.
        let file_is_big = reader.is_big_endian();
        reader.set_big_endian(false);
        let platform_word = reader.read_u32()?;
        reader.set_big_endian(file_is_big);
        if platform_word != platform as u32 {
            return Err(Error::PlatformMismatch {
                header: platform_word,
                detected: platform as u32,
            });
        }

        let mut bundle_flags = 0u32;
        let mut uncomp_info_offset = 0usize;
        if revision >= 4 {
            if reader.read_u32()? != 0 {
                bundle_flags |= flags::COMPRESSED;
            }
            reader.skip(4)?; // count of compressed resources
            uncomp_info_offset = reader.read_u32()? as usize;
        }
        if revision >= 5 {
            reader.skip(8)?; // two alignment words
        }

        self.magic_version = MagicVersion::Bndl;
        self.revision_number = revision;
        self.platform = platform;
        self.flags = bundle_flags;
        self.resources.clear();
        self.debug_info.clear();
        self.dependencies.clear();

        let compressed = bundle_flags & flags::COMPRESSED != 0;

        // The data regions sit back to back; each native slot starts where
        // the previous slot's recorded size ends.
        let mut region_starts = vec![0usize; block_count];
        let mut next = data_offset;
        for (start, size) in region_starts.iter_mut().zip(&region_sizes) {
            *start = next;
            next += size;
        }

        reader.seek(id_list_offset)?;
        let mut ids = Vec::with_capacity(num_entries as usize);
        for _ in 0..num_entries {
            ids.push(reader.read_u64()? as u32);
        }

        reader.seek(id_table_offset)?;
        for &id in &ids {
            reader.skip(4)?; // resident memory address
            let dependencies_offset = reader.read_u32()?;
            let resource_type = ResourceType(reader.read_u32()?);

            let mut blocks = [Block::default(), Block::default(), Block::default()];
            for legacy in 0..block_count {
                let entry_offset = reader.position();
                let size = reader.read_u32()?;
                let alignment = reader.read_u32()?;
                match remap_slot(platform, legacy) {
                    Some(slot) => {
                        if compressed {
                            blocks[slot].compressed_size = size;
                        } else {
                            blocks[slot].uncompressed_size = size;
                        }
                        blocks[slot].uncompressed_alignment =
                            if size == 0 { 1 } else { alignment.max(1) };
                    }
                    None => {
                        if size != 0 || alignment != 1 {
                            return Err(Error::Malformed {
                                section: "id table",
                                offset: entry_offset,
                            });
                        }
                    }
                }
            }
            for legacy in 0..block_count {
                let offset = reader.read_u32()? as usize;
                reader.skip(4)?; // constant 1
                let Some(slot) = remap_slot(platform, legacy) else {
                    continue;
                };
                let stored = blocks[slot].stored_size(compressed);
                if stored == 0 {
                    blocks[slot] = Block::default();
                    continue;
                }
                let mut data_reader = reader.clone();
                data_reader.seek(region_starts[legacy] + offset)?;
                blocks[slot].data = Some(data_reader.read_bytes(stored as usize)?.to_vec());
            }
            reader.skip(block_count * 4)?; // resident memory addresses

            self.resources.insert(
                id,
                Resource {
                    info: ResourceInfo {
                        checksum: 0,
                        dependencies_offset,
                        resource_type,
                        number_of_dependencies: 0,
                    },
                    blocks,
                },
            );
        }

        if compressed {
            reader.seek(uncomp_info_offset)?;
            for &id in &ids {
                for legacy in 0..block_count {
                    let entry_offset = reader.position();
                    let size = reader.read_u32()?;
                    let alignment = reader.read_u32()?;
                    match remap_slot(platform, legacy) {
                        Some(slot) => {
                            if let Some(resource) = self.resources.get_mut(&id) {
                                if resource.blocks[slot].data.is_some() {
                                    resource.blocks[slot].uncompressed_size = size;
                                    resource.blocks[slot].uncompressed_alignment =
                                        alignment.max(1);
                                }
                            }
                        }
                        None => {
                            if size != 0 || alignment != 1 {
                                return Err(Error::Malformed {
                                    section: "uncompressed size table",
                                    offset: entry_offset,
                                });
                            }
                        }
                    }
                }
            }
        }

        let with_deps: Vec<(u32, u32)> = self
            .resources
            .iter()
            .filter(|(_, r)| r.info.dependencies_offset != 0)
            .map(|(&id, r)| (id, r.info.dependencies_offset))
            .collect();
        for (id, offset) in with_deps {
            reader.seek(offset as usize)?;
            let count = reader.read_u32()? as u16;
            let zero_offset = reader.position();
            if reader.read_u32()? != 0 {
                return Err(Error::Malformed {
                    section: "import table",
                    offset: zero_offset,
                });
            }
            let mut deps = Vec::with_capacity(count as usize);
            for _ in 0..count {
                deps.push(Dependency::read(reader)?);
            }
            if let Some(resource) = self.resources.get_mut(&id) {
                resource.info.number_of_dependencies = count;
            }
            self.dependencies.insert(id, deps);
        }

        // The debug-name table travels as an ordinary text resource: the
        // game's tooling stores it under a well-known ID, while tables
        // written here trail the bundle under the synthetic ID (gated on
        // its type to avoid eating a real resource). Decode it and take it
        // out of the resource map; both the fetch and the parse are
        // advisory.
        let debug_id = if self.resources.contains_key(&DEBUG_RESOURCE_ID) {
            Some(DEBUG_RESOURCE_ID)
        } else if self
            .resources
            .get(&DEBUG_WRITE_ID)
            .is_some_and(|r| r.info.resource_type == ResourceType::TEXT_FILE)
        {
            Some(DEBUG_WRITE_ID)
        } else {
            None
        };
        if let Some(debug_id) = debug_id {
            if let Ok(Some(bytes)) = self.get_binary(debug_id, 0) {
                let mut table_reader = ByteReader::new(&bytes);
                table_reader.set_big_endian(platform.is_big_endian());
                if let Ok(length) = table_reader.read_u32() {
                    if let Ok(text) = table_reader.read_bytes(length as usize) {
                        let repaired = rst::repair_writer_quirks(&String::from_utf8_lossy(text));
                        self.debug_info = rst::from_xml(&repaired);
                    }
                }
                self.flags |= flags::HAS_RESOURCE_STRING_TABLE;
                self.resources.remove(&debug_id);
                self.dependencies.remove(&debug_id);
            }
        }

        Ok(())
    }

    /// Serialize as `bndl`.
    pub(crate) fn save_bndl(&self) -> Result<Vec<u8>> {
        let compressed = self.flags & flags::COMPRESSED != 0;
        if compressed && self.revision_number <= 3 {
            return Err(Error::CompressionUnsupported);
        }

        // The debug-name table only fits the uncompressed layout; it is
        // written as a synthetic trailing resource and never enters the
        // public resource map.
        let write_debug = !self.debug_info.is_empty()
            && !compressed
            && !self.resources.contains_key(&DEBUG_WRITE_ID);
        let debug_entry: Option<(u32, Resource)> = if write_debug {
            let xml = rst::to_xml(&self.debug_info)?;
            let mut payload = ByteWriter::new();
            payload.set_big_endian(self.platform.is_big_endian());
            payload.write_u32(xml.len() as u32);
            payload.write_bytes(xml.as_bytes());
            let bytes = payload.into_inner();
            Some((
                DEBUG_WRITE_ID,
                Resource {
                    info: ResourceInfo {
                        checksum: 0,
                        dependencies_offset: 0,
                        resource_type: ResourceType::TEXT_FILE,
                        number_of_dependencies: 0,
                    },
                    blocks: [
                        Block {
                            uncompressed_size: bytes.len() as u32,
                            uncompressed_alignment: 4,
                            compressed_size: 0,
                            data: Some(bytes),
                        },
                        Block::default(),
                        Block::default(),
                    ],
                },
            ))
        } else {
            None
        };

        let entries: Vec<(u32, &Resource)> = self
            .resources
            .iter()
            .map(|(&id, r)| (id, r))
            .chain(debug_entry.as_ref().map(|(id, r)| (*id, r)))
            .collect();
        let block_count = legacy_block_count(self.platform);

        let mut w = ByteWriter::new();
        w.set_big_endian(self.platform.is_big_endian());

        w.write_bytes(b"bndl");
        w.write_u32(self.revision_number);
        w.write_u32(entries.len() as u32);
        let mut region_header_pos = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            region_header_pos.push((w.reserve_u32(), w.reserve_u32())); // size, alignment
        }
        for _ in 0..block_count {
            w.write_u32(0); // resident memory addresses
        }
        let id_list_pos = w.reserve_u32();
        let id_table_pos = w.reserve_u32();
        let imports_pos = w.reserve_u32();
        let data_pos = w.reserve_u32();

        // The platform word is little-endian even in big-endian bundles.
        let file_is_big = self.platform.is_big_endian();
        w.set_big_endian(false);
        w.write_u32(self.platform as u32);
        w.set_big_endian(file_is_big);

        let mut uncomp_info_pos = None;
        if self.revision_number >= 4 {
            w.write_u32(u32::from(compressed));
            w.write_u32(if compressed { entries.len() as u32 } else { 0 });
            uncomp_info_pos = Some(w.reserve_u32());
        }
        if self.revision_number >= 5 {
            w.write_u32(0);
            w.write_u32(0);
        }
        w.align_to(16);

        w.patch_u32(id_list_pos, w.position() as u32);
        for (id, _) in &entries {
            w.write_u64(*id as u64);
        }

        w.patch_u32(id_table_pos, w.position() as u32);
        let mut dep_pos = Vec::with_capacity(entries.len());
        let mut data_ptr_pos = vec![[0usize; 3]; entries.len()];
        for (i, (_, resource)) in entries.iter().enumerate() {
            w.write_u32(0); // resident memory address
            dep_pos.push(w.reserve_u32());
            w.write_u32(resource.info.resource_type.0);
            for legacy in 0..block_count {
                match remap_slot(self.platform, legacy) {
                    Some(slot) => {
                        let block = &resource.blocks[slot];
                        w.write_u32(block.stored_size(compressed));
                        w.write_u32(block.uncompressed_alignment);
                    }
                    None => {
                        w.write_u32(0);
                        w.write_u32(1);
                    }
                }
            }
            for legacy in 0..block_count {
                match remap_slot(self.platform, legacy) {
                    Some(slot) => data_ptr_pos[i][slot] = w.reserve_u32(),
                    None => w.write_u32(0),
                }
                w.write_u32(1);
            }
            for _ in 0..block_count {
                w.write_u32(0); // resident memory addresses
            }
        }

        if compressed {
            if let Some(pos) = uncomp_info_pos {
                w.patch_u32(pos, w.position() as u32);
            }
            for (_, resource) in &entries {
                for legacy in 0..block_count {
                    match remap_slot(self.platform, legacy) {
                        Some(slot) => {
                            let block = &resource.blocks[slot];
                            w.write_u32(block.uncompressed_size);
                            w.write_u32(block.uncompressed_alignment);
                        }
                        None => {
                            w.write_u32(0);
                            w.write_u32(1);
                        }
                    }
                }
            }
        }

        w.patch_u32(imports_pos, w.position() as u32);
        for (i, (id, _)) in entries.iter().enumerate() {
            let Some(deps) = self.dependencies.get(id) else {
                continue;
            };
            if deps.is_empty() {
                continue;
            }
            w.patch_u32(dep_pos[i], w.position() as u32);
            w.write_u32(deps.len() as u32);
            w.write_u32(0);
            for dep in deps {
                dep.write(&mut w);
            }
        }

        w.patch_u32(data_pos, w.position() as u32);
        let mut region_sizes = [0usize; 3];
        for slot in 0..3 {
            let block_start = w.position();
            for (i, (_, resource)) in entries.iter().enumerate() {
                let Some(data) = &resource.blocks[slot].data else {
                    continue;
                };
                w.patch_u32(data_ptr_pos[i][slot], (w.position() - block_start) as u32);
                w.write_bytes(data);
            }
            region_sizes[slot] = w.position() - block_start;
        }

        // Header region sizes, plus the alignment the game's allocator uses
        // for each pool.
        for legacy in 0..block_count {
            let (size_at, alignment_at) = region_header_pos[legacy];
            match remap_slot(self.platform, legacy) {
                Some(slot) => {
                    let size = region_sizes[slot];
                    w.patch_u32(size_at, size as u32);
                    let alignment = if size == 0 {
                        1
                    } else if slot == 0 {
                        1024
                    } else {
                        4096
                    };
                    w.patch_u32(alignment_at, alignment);
                }
                None => {
                    w.patch_u32(size_at, 0);
                    w.patch_u32(alignment_at, 1);
                }
            }
        }

        Ok(w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_covers_every_native_slot() {
        let expected: [(&Platform, &[Option<usize>]); 3] = [
            (&Platform::Pc, &[Some(0), Some(1), Some(2), None]),
            (&Platform::Xbox360, &[Some(0), None, Some(1), Some(2), None]),
            (
                &Platform::Ps3,
                &[Some(0), None, None, None, Some(1), Some(2)],
            ),
        ];
        for (platform, mapping) in expected {
            assert_eq!(legacy_block_count(*platform), mapping.len());
            for (legacy, &canonical) in mapping.iter().enumerate() {
                assert_eq!(remap_slot(*platform, legacy), canonical);
            }
        }
    }

    #[test]
    fn every_canonical_slot_is_reachable() {
        for platform in [Platform::Pc, Platform::Xbox360, Platform::Ps3] {
            let mut seen = [false; 3];
            for legacy in 0..legacy_block_count(platform) {
                if let Some(slot) = remap_slot(platform, legacy) {
                    seen[slot] = true;
                }
            }
            assert_eq!(seen, [true; 3]);
        }
    }
}
