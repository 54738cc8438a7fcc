//! Modern (`bnd2`) container layout.
//!
//! A 48-byte header, an optional NUL-terminated debug-name XML, a table of
//! 64-byte entry records, then the three data blocks back to back. All
//! table offsets are absolute; per-entry data offsets are relative to their
//! block's start. Revision is always 2; big-endian variants exist on
//! consoles for reading, writing targets PC.

use crate::binary::{ByteReader, ByteWriter};
use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::rst;
use crate::types::{
    flags, pack_size_and_alignment, unpack_size_and_alignment, Block, MagicVersion, Platform,
    Resource, ResourceInfo, ResourceType,
};

impl Bundle {
    /// Parse a `bnd2` bundle. The reader sits just past the magic.
    pub(crate) fn load_bnd2(&mut self, reader: &mut ByteReader<'_>) -> Result<()> {
        let mut revision = reader.read_u32()?;
        let platform_word = reader.read_u32()?;
        let platform =
            Platform::from_u32(platform_word).ok_or(Error::UnknownPlatform(platform_word))?;
        reader.set_big_endian(platform.is_big_endian());
        // The revision was consumed before the platform word fixed the byte
        // order, so normalize it after the fact.
        if reader.is_big_endian() {
            revision = revision.swap_bytes();
        }
        if revision != 2 {
            return Err(Error::UnsupportedRevision(revision));
        }

        let rst_offset = reader.read_u32()? as usize;
        let num_entries = reader.read_u32()?;
        let id_block_offset = reader.read_u32()? as usize;
        let data_block_offsets = [
            reader.read_u32()? as usize,
            reader.read_u32()? as usize,
            reader.read_u32()? as usize,
        ];
        let bundle_flags = reader.read_u32()?;
        // The final 8 header bytes are padding; the seek below skips them.

        self.magic_version = MagicVersion::Bnd2;
        self.revision_number = revision;
        self.platform = platform;
        self.flags = bundle_flags;
        self.resources.clear();
        self.debug_info.clear();
        self.dependencies.clear();

        let compressed = bundle_flags & flags::COMPRESSED != 0;

        reader.seek(id_block_offset)?;
        for _ in 0..num_entries {
            let id_offset = reader.position();
            let id = reader.read_u64()? as u32;
            if id == 0 {
                return Err(Error::Malformed {
                    section: "id block",
                    offset: id_offset,
                });
            }
            let checksum = reader.read_u64()? as u32;

            let mut blocks = [Block::default(), Block::default(), Block::default()];
            for block in &mut blocks {
                let word = reader.read_u32()?;
                let (size, alignment) = unpack_size_and_alignment(word);
                block.uncompressed_size = size;
                block.uncompressed_alignment = alignment;
            }
            for block in &mut blocks {
                block.compressed_size = reader.read_u32()?;
            }
            for (slot, block) in blocks.iter_mut().enumerate() {
                let offset = reader.read_u32()? as usize;
                let stored = block.stored_size(compressed);
                if stored == 0 {
                    *block = Block::default();
                    continue;
                }
                let mut data_reader = reader.clone();
                data_reader.seek(data_block_offsets[slot] + offset)?;
                block.data = Some(data_reader.read_bytes(stored as usize)?.to_vec());
            }

            let dependencies_offset = reader.read_u32()?;
            let resource_type = ResourceType(reader.read_u32()?);
            let number_of_dependencies = reader.read_u16()?;
            reader.skip(2)?; // padding

            self.resources.insert(
                id,
                Resource {
                    info: ResourceInfo {
                        checksum,
                        dependencies_offset,
                        resource_type,
                        number_of_dependencies,
                    },
                    blocks,
                },
            );
        }

        // The debug-name table is advisory; a broken one never fails the load.
        if bundle_flags & flags::HAS_RESOURCE_STRING_TABLE != 0 && reader.seek(rst_offset).is_ok() {
            if let Ok(xml) = reader.read_cstring() {
                self.debug_info = rst::from_xml(&String::from_utf8_lossy(xml));
            }
        }

        Ok(())
    }

    /// Serialize as `bnd2`. Only the PC layout is written.
    pub(crate) fn save_bnd2(&self) -> Result<Vec<u8>> {
        if self.platform != Platform::Pc {
            return Err(Error::UnsupportedWritePlatform(self.platform));
        }

        let mut w = ByteWriter::new();

        w.write_bytes(b"bnd2");
        w.write_u32(2);
        w.write_u32(Platform::Pc as u32);
        let rst_pos = w.reserve_u32();
        w.write_u32(self.resources.len() as u32);
        let id_block_pos = w.reserve_u32();
        let data_block_pos = [w.reserve_u32(), w.reserve_u32(), w.reserve_u32()];
        // Every bundle the game shipped has the two unknown bits set.
        w.write_u32(self.flags | flags::UNUSED_1 | flags::UNUSED_2);
        w.align_to(16);

        w.patch_u32(rst_pos, w.position() as u32);
        if self.flags & flags::HAS_RESOURCE_STRING_TABLE != 0 {
            let xml = rst::to_xml(&self.debug_info)?;
            w.write_bytes(xml.as_bytes());
            w.write_u8(0);
            w.align_to(16);
        }

        w.patch_u32(id_block_pos, w.position() as u32);
        let mut data_ptr_pos = Vec::with_capacity(self.resources.len());
        for (&id, resource) in &self.resources {
            w.write_u64(id as u64);
            w.write_u64(resource.info.checksum as u64);
            for block in &resource.blocks {
                w.write_u32(pack_size_and_alignment(
                    block.uncompressed_size,
                    block.uncompressed_alignment,
                ));
            }
            for block in &resource.blocks {
                w.write_u32(block.compressed_size);
            }
            data_ptr_pos.push([w.reserve_u32(), w.reserve_u32(), w.reserve_u32()]);
            w.write_u32(resource.info.dependencies_offset);
            w.write_u32(resource.info.resource_type.0);
            w.write_u16(resource.info.number_of_dependencies);
            w.write_u16(0); // padding
        }

        let last = self.resources.len().wrapping_sub(1);
        for slot in 0..3 {
            let block_start = w.position();
            w.patch_u32(data_block_pos[slot], block_start as u32);
            for (i, resource) in self.resources.values().enumerate() {
                let Some(data) = &resource.blocks[slot].data else {
                    continue;
                };
                w.patch_u32(data_ptr_pos[i][slot], (w.position() - block_start) as u32);
                w.write_bytes(data);
                w.align_to(if slot != 0 && i != last { 0x80 } else { 16 });
            }
            if slot != 2 {
                w.align_to(0x80);
            }
        }

        Ok(w.into_inner())
    }
}
