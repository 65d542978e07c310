use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use wasmparser::{BinaryReaderError, ExternalKind, Parser, Payload, Validator};

use crate::loader::LoadError;

/// Leading bytes of every WebAssembly binary.
pub const WASM_MAGIC: [u8; 4] = *b"\0asm";
/// Binary format version understood by this host.
pub const WASM_VERSION: u32 = 1;

/// Section identifiers of the core binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Custom,
    Type,
    Import,
    Function,
    Table,
    Memory,
    Global,
    Export,
    Start,
    Element,
    Code,
    Data,
    DataCount,
    Tag,
}

impl SectionKind {
    pub fn from_id(id: u8) -> Option<Self> {
        use SectionKind::*;
        Some(match id {
            0 => Custom,
            1 => Type,
            2 => Import,
            3 => Function,
            4 => Table,
            5 => Memory,
            6 => Global,
            7 => Export,
            8 => Start,
            9 => Element,
            10 => Code,
            11 => Data,
            12 => DataCount,
            13 => Tag,
            _ => return None,
        })
    }
}

/// Location of a section payload inside the module bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub kind: SectionKind,
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Function,
    Table,
    Memory,
    Global,
    Tag,
}

impl From<ExternalKind> for ExportKind {
    fn from(kind: ExternalKind) -> Self {
        match kind {
            ExternalKind::Func => Self::Function,
            ExternalKind::Table => Self::Table,
            ExternalKind::Memory => Self::Memory,
            ExternalKind::Global => Self::Global,
            ExternalKind::Tag => Self::Tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub index: u32,
}

/// Validated executable binary module.
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    label: String,
    bytes: Arc<[u8]>,
    version: u32,
    sections: Vec<SectionHeader>,
    exports: Vec<Export>,
}

impl ModuleHandle {
    /// Validates the module and indexes its sections and exports.
    ///
    /// The header is checked first so that a version mismatch is reported as
    /// [`LoadError::Incompatible`]. Everything after it must pass full
    /// validation, including section order and function bodies.
    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> Result<Self, LoadError> {
        let label = label.into();
        let version = check_header(&label, &bytes)?;
        Validator::new()
            .validate_all(&bytes)
            .map_err(|err| LoadError::malformed(&label, format!("invalid module: {err}")))?;
        let (sections, exports) = index_module(&bytes)
            .map_err(|err| LoadError::malformed(&label, format!("invalid module: {err}")))?;
        debug!(
            "validated module {label}: {} section(s), {} export(s)",
            sections.len(),
            exports.len()
        );
        Ok(Self {
            label,
            bytes: Arc::from(bytes.into_boxed_slice()),
            version,
            sections,
            exports,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.name == name)
    }
}

/// Raw companion data for a module, such as its memory image.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    label: String,
    bytes: Arc<[u8]>,
}

impl ResourceHandle {
    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> Result<Self, LoadError> {
        let label = label.into();
        if bytes.is_empty() {
            return Err(LoadError::malformed(label, "resource is empty"));
        }
        Ok(Self {
            label,
            bytes: Arc::from(bytes.into_boxed_slice()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reads and validates a module from disk.
///
/// The read is blocking, so the returned future finishes on its first poll.
/// Under [`LoadStrategy::Joined`](crate::LoadStrategy::Joined) two file
/// factories therefore complete one after the other; fetch-backed factories
/// on the web host overlap.
pub async fn load_module_file(path: impl AsRef<Path>) -> Result<ModuleHandle, LoadError> {
    let (label, bytes) = read_artifact(path.as_ref())?;
    ModuleHandle::from_bytes(label, bytes)
}

/// Reads a companion resource from disk.
pub async fn load_resource_file(path: impl AsRef<Path>) -> Result<ResourceHandle, LoadError> {
    let (label, bytes) = read_artifact(path.as_ref())?;
    ResourceHandle::from_bytes(label, bytes)
}

fn read_artifact(path: &Path) -> Result<(String, Vec<u8>), LoadError> {
    let label = path.display().to_string();
    let mut data = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut data))
        .map_err(|source| LoadError::Unreachable {
            label: label.clone(),
            source,
        })?;
    Ok((label, data))
}

fn check_header(label: &str, data: &[u8]) -> Result<u32, LoadError> {
    if data.len() < 8 {
        return Err(LoadError::malformed(
            label,
            format!("module too small to contain header (len={})", data.len()),
        ));
    }
    if data[..4] != WASM_MAGIC {
        return Err(LoadError::malformed(
            label,
            format!("invalid module magic: found {:?}", &data[..4]),
        ));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != WASM_VERSION {
        return Err(LoadError::Incompatible {
            label: label.to_string(),
            version,
        });
    }
    Ok(version)
}

/// Walks the validated module and records its sections and exports.
fn index_module(
    data: &[u8],
) -> Result<(Vec<SectionHeader>, Vec<Export>), BinaryReaderError> {
    let mut sections = Vec::new();
    let mut exports = Vec::new();

    for payload in Parser::new(0).parse_all(data) {
        let payload = payload?;
        if let Some((id, range)) = payload.as_section() {
            if let Some(kind) = SectionKind::from_id(id) {
                sections.push(SectionHeader {
                    kind,
                    offset: range.start,
                    size: range.len(),
                });
            }
        }
        if let Payload::ExportSection(reader) = payload {
            for export in reader {
                let export = export?;
                exports.push(Export {
                    name: export.name.to_string(),
                    kind: ExportKind::from(export.kind),
                    index: export.index,
                });
            }
        }
    }

    Ok((sections, exports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use futures::FutureExt;
    use tempfile::NamedTempFile;

    fn module_bytes(sections: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&WASM_MAGIC);
        buffer.extend_from_slice(&WASM_VERSION.to_le_bytes());
        for (id, payload) in sections {
            buffer.push(*id);
            buffer.push(payload.len() as u8);
            buffer.extend_from_slice(payload);
        }
        buffer
    }

    /// One `() -> ()` function exported as `step`, plus an exported memory.
    fn simulation_sections() -> Vec<(u8, Vec<u8>)> {
        let mut exports = vec![2, 4];
        exports.extend_from_slice(b"step");
        exports.extend_from_slice(&[0, 0, 6]);
        exports.extend_from_slice(b"memory");
        exports.extend_from_slice(&[2, 0]);
        vec![
            (1, vec![1, 0x60, 0, 0]),
            (3, vec![1, 0]),
            (5, vec![1, 0, 1]),
            (7, exports),
            (10, vec![1, 2, 0, 0x0b]),
        ]
    }

    #[test]
    fn header_only_module_is_valid() {
        let module = ModuleHandle::from_bytes("empty.wasm", module_bytes(&[])).unwrap();
        assert_eq!(module.version(), 1);
        assert!(module.sections().is_empty());
        assert!(module.exports().is_empty());
        assert_eq!(module.len(), 8);
    }

    #[test]
    fn exports_are_indexed() {
        let mut sections = vec![(0, b"\x04meta".to_vec())];
        sections.extend(simulation_sections());
        let module = ModuleHandle::from_bytes("sim.wasm", module_bytes(&sections)).unwrap();
        let kinds: Vec<_> = module.sections().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Custom,
                SectionKind::Type,
                SectionKind::Function,
                SectionKind::Memory,
                SectionKind::Export,
                SectionKind::Code,
            ]
        );
        let step = module.export("step").unwrap();
        assert_eq!(step.kind, ExportKind::Function);
        assert_eq!(step.index, 0);
        assert_eq!(module.export("memory").unwrap().kind, ExportKind::Memory);
        assert!(module.export("missing").is_none());
    }

    #[test]
    fn section_offsets_point_at_payloads() {
        let bytes = module_bytes(&simulation_sections());
        let module = ModuleHandle::from_bytes("sim.wasm", bytes.clone()).unwrap();
        let types = module.sections()[0];
        assert_eq!(types.kind, SectionKind::Type);
        assert_eq!(types.offset, 10);
        assert_eq!(&bytes[types.offset..types.offset + types.size], &[1, 0x60, 0, 0]);
    }

    #[test]
    fn bad_magic_is_malformed() {
        let mut bytes = module_bytes(&[]);
        bytes[0] = b'X';
        let err = ModuleHandle::from_bytes("bad.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
        assert!(err.to_string().contains("invalid module magic"));
    }

    #[test]
    fn short_module_is_malformed() {
        let err = ModuleHandle::from_bytes("tiny.wasm", b"\0as".to_vec()).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn unknown_version_is_incompatible() {
        let mut bytes = module_bytes(&[]);
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        let err = ModuleHandle::from_bytes("v2.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Incompatible { version: 2, .. }));
    }

    #[test]
    fn truncated_section_is_malformed() {
        let mut bytes = module_bytes(&[(1, vec![1, 0x60, 0, 0])]);
        bytes.truncate(bytes.len() - 1);
        let err = ModuleHandle::from_bytes("cut.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn garbage_section_payload_is_malformed() {
        let bytes = module_bytes(&[(10, vec![0xff]), (1, vec![5, 0xff])]);
        let err = ModuleHandle::from_bytes("garbage.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
        assert!(err.to_string().contains("invalid module"));
    }

    #[test]
    fn out_of_order_sections_are_malformed() {
        let bytes = module_bytes(&[(3, vec![0]), (1, vec![0])]);
        let err = ModuleHandle::from_bytes("order.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn duplicate_sections_are_malformed() {
        let bytes = module_bytes(&[(1, vec![0]), (1, vec![0])]);
        let err = ModuleHandle::from_bytes("dup.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn export_of_missing_function_is_malformed() {
        let mut exports = vec![1, 4];
        exports.extend_from_slice(b"step");
        exports.extend_from_slice(&[0, 3]);
        let err = ModuleHandle::from_bytes("dangling.wasm", module_bytes(&[(7, exports)]))
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn repeated_custom_sections_are_allowed() {
        let bytes = module_bytes(&[(0, b"\x01a".to_vec()), (0, b"\x01b".to_vec())]);
        let module = ModuleHandle::from_bytes("custom.wasm", bytes).unwrap();
        assert_eq!(module.sections().len(), 2);
    }

    #[test]
    fn unknown_section_id_is_malformed() {
        let bytes = module_bytes(&[(42, vec![])]);
        let err = ModuleHandle::from_bytes("odd.wasm", bytes).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn empty_resource_is_malformed() {
        assert!(ResourceHandle::from_bytes("data.bin", Vec::new()).is_err());
        let resource = ResourceHandle::from_bytes("data.bin", vec![1, 2, 3]).unwrap();
        assert_eq!(resource.bytes(), &[1, 2, 3]);
        assert_eq!(resource.label(), "data.bin");
    }

    #[test]
    fn files_are_loaded_from_disk() {
        let mut module_file = NamedTempFile::new().expect("tmp module");
        module_file
            .write_all(&module_bytes(&simulation_sections()))
            .expect("write module");
        let mut resource_file = NamedTempFile::new().expect("tmp resource");
        resource_file.write_all(b"memory image").expect("write resource");

        let module = pollster::block_on(load_module_file(module_file.path())).unwrap();
        assert_eq!(module.exports().len(), 2);
        let resource = pollster::block_on(load_resource_file(resource_file.path())).unwrap();
        assert_eq!(resource.len(), 12);
    }

    #[test]
    fn file_reads_finish_on_first_poll() {
        let mut resource_file = NamedTempFile::new().expect("tmp resource");
        resource_file.write_all(b"data").expect("write resource");
        let resource = load_resource_file(resource_file.path())
            .now_or_never()
            .expect("file factory is ready immediately")
            .unwrap();
        assert_eq!(resource.len(), 4);
    }

    #[test]
    fn missing_file_is_unreachable() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("absent.wasm");
        let err = pollster::block_on(load_module_file(&path)).unwrap_err();
        assert!(matches!(err, LoadError::Unreachable { .. }));
        assert_eq!(err.label(), path.display().to_string());
    }
}
