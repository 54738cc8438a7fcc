//! Core bundle data types.

use std::fmt;

use crate::binary::{ByteReader, ByteWriter};
use crate::error::Result;

/// Bundle flag bits.
///
/// `UNUSED_1` and `UNUSED_2` are set in every bundle shipped with the game;
/// their meaning is unknown and they are preserved verbatim.
pub mod flags {
    /// Block payloads are stored zlib-compressed.
    pub const COMPRESSED: u32 = 1 << 0;
    /// Always set in shipped bnd2 bundles; meaning unknown.
    pub const UNUSED_1: u32 = 1 << 1;
    /// Always set in shipped bnd2 bundles; meaning unknown.
    pub const UNUSED_2: u32 = 1 << 2;
    /// The bundle carries a debug-name table.
    pub const HAS_RESOURCE_STRING_TABLE: u32 = 1 << 3;
}

/// Container layout version, selected by the four-byte file magic.
///
/// The two layouts are incompatible on disk but share the in-memory model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicVersion {
    /// Legacy `bndl` layout (revisions 3-5, PC / Xbox 360 / PS3).
    Bndl,
    /// Modern `bnd2` layout (revision 2, PC).
    Bnd2,
}

/// Target platform of a bundle. Anything other than PC is big-endian.
///
/// The discriminants are the literal little-endian header words; the
/// big-endian consoles store their small tag in the top byte, which is why
/// the platform word can be read little-endian regardless of file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Platform {
    Pc = 0x0000_0001,
    Xbox360 = 0x0200_0000,
    Ps3 = 0x0300_0000,
}

impl Platform {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x0000_0001 => Some(Platform::Pc),
            0x0200_0000 => Some(Platform::Xbox360),
            0x0300_0000 => Some(Platform::Ps3),
            _ => None,
        }
    }

    pub fn is_big_endian(self) -> bool {
        !matches!(self, Platform::Pc)
    }
}

/// Resource type tag.
///
/// Kept as an open 32-bit value rather than a closed enum: bundles from
/// other builds of the engine carry tags this list has never seen, and they
/// must round-trip untouched. The named constants cover every tag observed
/// in Burnout Paradise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceType(pub u32);

impl ResourceType {
    pub const RASTER: Self = Self(0x00);
    pub const MATERIAL: Self = Self(0x01);
    pub const TEXT_FILE: Self = Self(0x03);
    pub const VERTEX_DESC: Self = Self(0x0A);
    pub const MATERIAL_CRC32: Self = Self(0x0B);
    pub const RENDERABLE: Self = Self(0x0C);
    pub const MATERIAL_TECHNIQUE: Self = Self(0x0D);
    pub const TEXTURE_STATE: Self = Self(0x0E);
    pub const MATERIAL_STATE: Self = Self(0x0F);
    pub const SHADER_PROGRAM_BUFFER: Self = Self(0x12);
    pub const SHADER_PARAMETER: Self = Self(0x14);
    pub const DEBUG: Self = Self(0x16);
    pub const KD_TREE: Self = Self(0x17);
    pub const VOICE_HIERARCHY: Self = Self(0x18);
    pub const SNR: Self = Self(0x19);
    pub const INTERPRETER_DATA: Self = Self(0x1A);
    pub const ATTRIB_SYS_SCHEMA: Self = Self(0x1B);
    pub const ATTRIB_SYS_VAULT: Self = Self(0x1C);
    pub const ENTRY_LIST: Self = Self(0x1D);
    pub const APT_DATA_HEADER_TYPE: Self = Self(0x1E);
    pub const GUI_POPUP: Self = Self(0x1F);
    pub const FONT: Self = Self(0x21);
    pub const LUA_CODE: Self = Self(0x22);
    pub const INSTANCE_LIST: Self = Self(0x23);
    pub const COLLISION_MESH_DATA: Self = Self(0x24);
    pub const ID_LIST: Self = Self(0x25);
    pub const INSTANCE_COLLISION_LIST: Self = Self(0x26);
    pub const LANGUAGE: Self = Self(0x27);
    pub const SAT_NAV_TILE: Self = Self(0x28);
    pub const SAT_NAV_TILE_DIRECTORY: Self = Self(0x29);
    pub const MODEL: Self = Self(0x2A);
    pub const RW_COLOUR_CUBE: Self = Self(0x2B);
    pub const HUD_MESSAGE: Self = Self(0x2C);
    pub const HUD_MESSAGE_LIST: Self = Self(0x2D);
    pub const HUD_MESSAGE_SEQUENCE: Self = Self(0x2E);
    pub const HUD_MESSAGE_SEQUENCE_DICTIONARY: Self = Self(0x2F);
    pub const WORLD_PAINTER_2D: Self = Self(0x30);
    pub const PFX_HOOK_BUNDLE: Self = Self(0x31);
    pub const SHADER: Self = Self(0x32);
    pub const ICE_TAKE_DICTIONARY: Self = Self(0x41);
    pub const VIDEO_DATA: Self = Self(0x42);
    pub const POLYGON_SOUP_LIST: Self = Self(0x43);
    pub const COMMS_TOOL_LIST_DEFINITION: Self = Self(0x45);
    pub const COMMS_TOOL_LIST: Self = Self(0x46);
    pub const BINARY_FILE: Self = Self(0x50);
    pub const ANIMATION_COLLECTION: Self = Self(0x51);
    pub const REGISTRY: Self = Self(0xA000);
    pub const GENERIC_RWAC_WAVE_CONTENT: Self = Self(0xA020);
    pub const GINSU_WAVE_CONTENT: Self = Self(0xA021);
    pub const AEMS_BANK: Self = Self(0xA022);
    pub const CSIS: Self = Self(0xA023);
    pub const NICOTINE: Self = Self(0xA024);
    pub const SPLICER: Self = Self(0xA025);
    pub const FREQ_CONTENT: Self = Self(0xA026);
    pub const VOICE_HIERARCHY_COLLECTION: Self = Self(0xA027);
    pub const GENERIC_RWAC_REVERB_IR_CONTENT: Self = Self(0xA028);
    pub const SNAPSHOT_DATA: Self = Self(0xA029);
    pub const ZONE_LIST: Self = Self(0xB000);
    pub const LOOP_MODEL: Self = Self(0x10000);
    pub const AI_SECTIONS: Self = Self(0x10001);
    pub const TRAFFIC_DATA: Self = Self(0x10002);
    pub const TRIGGER: Self = Self(0x10003);
    pub const DEFORMATION_MODEL: Self = Self(0x10004);
    pub const VEHICLE_LIST: Self = Self(0x10005);
    pub const GRAPHICS_SPEC: Self = Self(0x10006);
    pub const PHYSICS_SPEC: Self = Self(0x10007);
    pub const PARTICLE_DESCRIPTION_COLLECTION: Self = Self(0x10008);
    pub const WHEEL_LIST: Self = Self(0x10009);
    pub const WHEEL_GRAPHICS_SPEC: Self = Self(0x1000A);
    pub const TEXTURE_NAME_MAP: Self = Self(0x1000B);
    pub const ICE_LIST: Self = Self(0x1000C);
    pub const ICE_DATA: Self = Self(0x1000D);
    pub const PROGRESSION: Self = Self(0x1000E);
    pub const PROP_PHYSICS: Self = Self(0x1000F);
    pub const PROP_GRAPHICS_LIST: Self = Self(0x10010);
    pub const PROP_INSTANCE_DATA: Self = Self(0x10011);
    pub const BRN_ENVIRONMENT_KEYFRAME: Self = Self(0x10012);
    pub const BRN_ENVIRONMENT_TIME_LINE: Self = Self(0x10013);
    pub const BRN_ENVIRONMENT_DICTIONARY: Self = Self(0x10014);
    pub const GRAPHICS_STUB: Self = Self(0x10015);
    pub const STATIC_SOUND_MAP: Self = Self(0x10016);
    pub const STREET_DATA: Self = Self(0x10018);
    pub const BRN_VFX_MESH_COLLECTION: Self = Self(0x10019);
    pub const MASSIVE_LOOKUP_TABLE: Self = Self(0x1001A);
    pub const VFX_PROP_COLLECTION: Self = Self(0x1001B);
    pub const STREAMED_DEFORMATION_SPEC: Self = Self(0x1001C);
    pub const PARTICLE_DESCRIPTION: Self = Self(0x1001D);
    pub const PLAYER_CAR_COLOURS: Self = Self(0x1001E);
    pub const CHALLENGE_LIST: Self = Self(0x1001F);
    pub const FLAPT_FILE: Self = Self(0x10020);
    pub const PROFILE_UPGRADE: Self = Self(0x10021);
    pub const VEHICLE_ANIMATION: Self = Self(0x10023);
    pub const BODYPART_REMAPPING: Self = Self(0x10024);
    pub const LUA_LIST: Self = Self(0x10025);
    pub const LUA_SCRIPT: Self = Self(0x10026);

    /// The well-known name of this tag, if it has one.
    pub fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x00 => "Raster",
            0x01 => "Material",
            0x03 => "TextFile",
            0x0A => "VertexDesc",
            0x0B => "MaterialCRC32",
            0x0C => "Renderable",
            0x0D => "MaterialTechnique",
            0x0E => "TextureState",
            0x0F => "MaterialState",
            0x12 => "ShaderProgramBuffer",
            0x14 => "ShaderParameter",
            0x16 => "Debug",
            0x17 => "KdTree",
            0x18 => "VoiceHierarchy",
            0x19 => "Snr",
            0x1A => "InterpreterData",
            0x1B => "AttribSysSchema",
            0x1C => "AttribSysVault",
            0x1D => "EntryList",
            0x1E => "AptDataHeaderType",
            0x1F => "GuiPopup",
            0x21 => "Font",
            0x22 => "LuaCode",
            0x23 => "InstanceList",
            0x24 => "CollisionMeshData",
            0x25 => "IDList",
            0x26 => "InstanceCollisionList",
            0x27 => "Language",
            0x28 => "SatNavTile",
            0x29 => "SatNavTileDirectory",
            0x2A => "Model",
            0x2B => "RwColourCube",
            0x2C => "HudMessage",
            0x2D => "HudMessageList",
            0x2E => "HudMessageSequence",
            0x2F => "HudMessageSequenceDictionary",
            0x30 => "WorldPainter2D",
            0x31 => "PFXHookBundle",
            0x32 => "Shader",
            0x41 => "ICETakeDictionary",
            0x42 => "VideoData",
            0x43 => "PolygonSoupList",
            0x45 => "CommsToolListDefinition",
            0x46 => "CommsToolList",
            0x50 => "BinaryFile",
            0x51 => "AnimationCollection",
            0xA000 => "Registry",
            0xA020 => "GenericRwacWaveContent",
            0xA021 => "GinsuWaveContent",
            0xA022 => "AemsBank",
            0xA023 => "Csis",
            0xA024 => "Nicotine",
            0xA025 => "Splicer",
            0xA026 => "FreqContent",
            0xA027 => "VoiceHierarchyCollection",
            0xA028 => "GenericRwacReverbIRContent",
            0xA029 => "SnapshotData",
            0xB000 => "ZoneList",
            0x10000 => "LoopModel",
            0x10001 => "AISections",
            0x10002 => "TrafficData",
            0x10003 => "Trigger",
            0x10004 => "DeformationModel",
            0x10005 => "VehicleList",
            0x10006 => "GraphicsSpec",
            0x10007 => "PhysicsSpec",
            0x10008 => "ParticleDescriptionCollection",
            0x10009 => "WheelList",
            0x1000A => "WheelGraphicsSpec",
            0x1000B => "TextureNameMap",
            0x1000C => "ICEList",
            0x1000D => "ICEData",
            0x1000E => "Progression",
            0x1000F => "PropPhysics",
            0x10010 => "PropGraphicsList",
            0x10011 => "PropInstanceData",
            0x10012 => "BrnEnvironmentKeyframe",
            0x10013 => "BrnEnvironmentTimeLine",
            0x10014 => "BrnEnvironmentDictionary",
            0x10015 => "GraphicsStub",
            0x10016 => "StaticSoundMap",
            0x10018 => "StreetData",
            0x10019 => "BrnVFXMeshCollection",
            0x1001A => "MassiveLookupTable",
            0x1001B => "VFXPropCollection",
            0x1001C => "StreamedDeformationSpec",
            0x1001D => "ParticleDescription",
            0x1001E => "PlayerCarColours",
            0x1001F => "ChallengeList",
            0x10020 => "FlaptFile",
            0x10021 => "ProfileUpgrade",
            0x10023 => "VehicleAnimation",
            0x10024 => "BodypartRemapping",
            0x10025 => "LUAList",
            0x10026 => "LUAScript",
            _ => return None,
        })
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08x}", self.0),
        }
    }
}

/// A cross-reference from one resource to another: the referenced resource
/// ID and the byte offset within the owner's decoded block 0 where the
/// reference lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub resource_id: u32,
    pub internal_offset: u32,
}

impl Dependency {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let resource_id = reader.read_u64()? as u32;
        let internal_offset = reader.read_u32()?;
        reader.skip(4)?;
        Ok(Self {
            resource_id,
            internal_offset,
        })
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) {
        writer.write_u64(self.resource_id as u64);
        writer.write_u32(self.internal_offset);
        writer.write_u32(0);
    }
}

/// One of the three per-resource data slots.
///
/// `data` holds the bytes exactly as they sit in the file: compressed when
/// the bundle's `COMPRESSED` flag is set, raw otherwise. An empty slot has
/// no data, zero sizes, and alignment 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub uncompressed_size: u32,
    pub uncompressed_alignment: u32,
    pub compressed_size: u32,
    pub data: Option<Vec<u8>>,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            uncompressed_size: 0,
            uncompressed_alignment: 1,
            compressed_size: 0,
            data: None,
        }
    }
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    /// Size of the payload as stored on disk.
    pub(crate) fn stored_size(&self, compressed: bool) -> u32 {
        if compressed {
            self.compressed_size
        } else {
            self.uncompressed_size
        }
    }
}

/// Per-resource metadata carried alongside the data blocks.
///
/// `checksum` is opaque: it is stored widened to 64 bits on disk and
/// round-trips untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceInfo {
    pub checksum: u32,
    /// Offset of the dependency list: relative to decoded block 0 in bnd2
    /// bundles, an absolute file offset in bndl bundles. Zero when the
    /// resource has no dependencies.
    pub dependencies_offset: u32,
    pub resource_type: ResourceType,
    pub number_of_dependencies: u16,
}

/// A resource as held in the bundle: metadata plus exactly three blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resource {
    pub info: ResourceInfo,
    pub blocks: [Block; 3],
}

/// Decoded view of a resource as accepted and returned by the public API:
/// uncompressed per-block payloads, their alignments, and the dependency
/// list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    pub blocks: [Option<Vec<u8>>; 3],
    pub alignments: [u32; 3],
    pub dependencies: Vec<Dependency>,
}

impl Default for ResourceData {
    fn default() -> Self {
        Self {
            blocks: [None, None, None],
            alignments: [1, 1, 1],
            dependencies: Vec::new(),
        }
    }
}

/// A debug-name table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub name: String,
    pub type_name: String,
}

/// Split a stored size word into (size, alignment).
///
/// The top nibble is the log2 of the block alignment; the low 28 bits are
/// the true uncompressed size.
pub(crate) fn unpack_size_and_alignment(word: u32) -> (u32, u32) {
    (word & 0x0FFF_FFFF, 1 << (word >> 28))
}

/// Merge a size and a power-of-two alignment back into one word.
pub(crate) fn pack_size_and_alignment(size: u32, alignment: u32) -> u32 {
    size | (alignment.trailing_zeros() << 28)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_word_nibble_packing() {
        assert_eq!(unpack_size_and_alignment(0), (0, 1));
        assert_eq!(unpack_size_and_alignment(0x2000_000B), (11, 4));
        assert_eq!(pack_size_and_alignment(11, 4), 0x2000_000B);
        assert_eq!(pack_size_and_alignment(0, 1), 0);

        let word = pack_size_and_alignment(0x0FFF_FFFF, 0x8000);
        assert_eq!(unpack_size_and_alignment(word), (0x0FFF_FFFF, 0x8000));
    }

    #[test]
    fn dependency_record_is_sixteen_bytes() {
        let dep = Dependency {
            resource_id: 0xAABBCCDD,
            internal_offset: 0x10,
        };
        let mut w = ByteWriter::new();
        dep.write(&mut w);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 16);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(Dependency::read(&mut r).unwrap(), dep);
    }

    #[test]
    fn resource_type_names() {
        assert_eq!(ResourceType::TEXT_FILE.name(), Some("TextFile"));
        assert_eq!(ResourceType::LUA_SCRIPT.name(), Some("LUAScript"));
        assert_eq!(ResourceType(0xDEAD).name(), None);
        assert_eq!(ResourceType(0xDEAD).to_string(), "0x0000dead");
    }

    #[test]
    fn platform_word_mapping() {
        assert_eq!(Platform::from_u32(1), Some(Platform::Pc));
        assert_eq!(Platform::from_u32(0x0200_0000), Some(Platform::Xbox360));
        assert_eq!(Platform::from_u32(0x0300_0000), Some(Platform::Ps3));
        assert_eq!(Platform::from_u32(0x0400_0000), None);
        assert!(!Platform::Pc.is_big_endian());
        assert!(Platform::Ps3.is_big_endian());
    }
}
