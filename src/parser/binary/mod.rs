//! Binary backend: a managed module read through dotscope's metadata view.
//!
//! Nothing is loaded or executed. dotscope parses the PE image, metadata
//! streams, signatures and IL; this module maps what it reads onto the
//! adapter types and keeps a handful of row indexes built at open time
//! (nesting, member ownership, accessor semantics, attribute markers).
//!
//! Handles: a [`TypeId`] is a TypeDef row, a [`MemberId`] is the member's
//! metadata token (`table << 24 | row`).

pub mod pdb;
pub mod signature;
pub mod xmldoc;

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

use dotscope::assembly::{decode_stream, Instruction, Operand};
use dotscope::metadata::method::MethodBody;
use dotscope::metadata::tables::{
    AssemblyRaw, AssemblyRefRaw, CodedIndex, CustomAttributeRaw, EventMapRaw, EventRaw, FieldRaw,
    InterfaceImplRaw, MemberRefRaw, MethodDefRaw, MethodSemanticsRaw, MethodSpecRaw, ModuleRaw,
    NestedClassRaw, PropertyMapRaw, PropertyRaw, StandAloneSigRaw, TableId, TypeDefRaw,
    TypeRefRaw, TypeSpecRaw,
};
use dotscope::metadata::streams::TablesHeader;
use dotscope::metadata::token::Token;
use dotscope::{CilAssemblyView, Parser, ValidationConfig};
use tracing::{debug, trace, warn};

use self::pdb::PortablePdb;
use self::signature::TokenResolver;
use self::xmldoc::XmlDocs;
use super::{
    BodyReference, ExportTable, ExportedMember, ExportedType, MemberId, MemberRef, MemberSymbol,
    MemberUsage, NamedType, SymbolAdapter, SymbolError, SymbolIndex, TypeExpr, TypeId, TypeRef,
    TypeSymbol, TypeUsage,
};
use crate::error::{GraphError, Result};
use crate::graph::types::{MemberKind, SourceLocation};
use crate::names;

/// Failure inside the metadata reader.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error(transparent)]
    Dotscope(#[from] dotscope::Error),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("{0} out of bounds")]
    OutOfBounds(&'static str),

    #[error("bad row {row} in {table}")]
    BadRow { table: &'static str, row: u32 },

    #[error("rva {0:#x} is outside every section")]
    BadRva(u32),

    #[error("bad signature: {0}")]
    BadSignature(&'static str),

    #[error("bad method body: {0}")]
    BadBody(&'static str),
}

type MetaResult<T> = std::result::Result<T, MetadataError>;

/// Assemblies that define the primitive types, in order of preference.
const CORE_LIBRARIES: &[&str] = &["System.Runtime", "mscorlib", "netstandard", "System.Private.CoreLib"];

const COMPILER_SERVICES: &str = "System.Runtime.CompilerServices";

const MAX_NESTING: usize = 64;

const TYPE_REF: u8 = TableId::TypeRef as u8;
const TYPE_DEF: u8 = TableId::TypeDef as u8;
const FIELD: u8 = TableId::Field as u8;
const METHOD_DEF: u8 = TableId::MethodDef as u8;
const MEMBER_REF: u8 = TableId::MemberRef as u8;
const STANDALONE_SIG: u8 = TableId::StandAloneSig as u8;
const EVENT: u8 = TableId::Event as u8;
const PROPERTY: u8 = TableId::Property as u8;
const TYPE_SPEC: u8 = TableId::TypeSpec as u8;
const METHOD_SPEC: u8 = TableId::MethodSpec as u8;

// Method, field and type attribute bits (ECMA-335 II.23.1).
const ACCESS_MASK: u32 = 0x0007;
const ACCESS_PRIVATE_SCOPE: u32 = 0x0000;
const ACCESS_PRIVATE: u32 = 0x0001;
const ACCESS_FAM_AND_ASSEM: u32 = 0x0002;
const METHOD_STATIC: u32 = 0x0010;
const FIELD_STATIC: u32 = 0x0010;
const FIELD_RT_SPECIAL_NAME: u32 = 0x0400;
const TYPE_INTERFACE: u32 = 0x0020;

// Opcodes that carry a member token.
const NOP: u8 = 0x00;
const LDARG_0: u8 = 0x02;
const JMP: u8 = 0x27;
const CALL: u8 = 0x28;
const RET: u8 = 0x2A;
const CALLVIRT: u8 = 0x6F;
const NEWOBJ: u8 = 0x73;
const LDFLD: u8 = 0x7B;
const STSFLD: u8 = 0x80;
const EXTENDED: u8 = 0xFE;
const LDFTN: u8 = 0x06;
const LDVIRTFTN: u8 = 0x07;

fn token(table: TableId, row: u32) -> u32 {
    Token::from_parts(table, row).value()
}

fn is_private_access(flags: u32) -> bool {
    matches!(
        flags & ACCESS_MASK,
        ACCESS_PRIVATE_SCOPE | ACCESS_PRIVATE | ACCESS_FAM_AND_ASSEM
    )
}

fn is_constructor_name(name: &str) -> bool {
    name == ".ctor" || name == ".cctor"
}

/// Row ids `1..=count`.
fn rows(count: u32) -> Range<u32> {
    1..count.saturating_add(1)
}

/// Rows `start..next` of a list column, clamped to `1..=count`.
fn list_range(start: u32, next: Option<u32>, count: u32) -> Range<u32> {
    let end = count.saturating_add(1);
    let start = start.clamp(1, end);
    start..next.unwrap_or(end).clamp(start, end)
}

/// One range per owner row from consecutive list starts.
fn list_ranges(starts: &[u32], count: u32) -> Vec<Range<u32>> {
    starts
        .iter()
        .enumerate()
        .map(|(i, start)| list_range(*start, starts.get(i + 1).copied(), count))
        .collect()
}

/// Call, creation or field access carried by one instruction.
fn member_operand(instruction: &Instruction) -> Option<(Token, MemberUsage)> {
    let Operand::Token(operand) = &instruction.operand else {
        return None;
    };
    let usage = match (instruction.prefix, instruction.opcode) {
        (0, CALL | CALLVIRT | JMP) | (EXTENDED, LDFTN | LDVIRTFTN) => MemberUsage::Call,
        (0, NEWOBJ) => MemberUsage::Creation,
        (0, LDFLD..=STSFLD) => MemberUsage::Access,
        _ => return None,
    };
    Some((*operand, usage))
}

/// `ldarg.0; call <base ctor>; ret`, nops aside.
fn is_trivial_constructor(instructions: &[Instruction]) -> bool {
    let mut opcodes = instructions
        .iter()
        .filter(|i| !(i.prefix == 0 && i.opcode == NOP))
        .map(|i| (i.prefix, i.opcode));
    opcodes.by_ref().take(3).eq([(0, LDARG_0), (0, CALL), (0, RET)]) && opcodes.next().is_none()
}

/// A method that implements a property or event.
#[derive(Debug, Clone, Copy)]
struct Accessor {
    /// Property or event token.
    owner: u32,
    kind: MemberKind,
}

/// Attributes that change how a row is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    CompilerGenerated,
    Extension,
}

/// Member-token resolution strategy. Each one handles one token table and
/// answers `None` for anything else.
type MemberStrategy = fn(&BinaryModule, Token, &SymbolIndex) -> Option<MemberRef>;

const MEMBER_STRATEGIES: [MemberStrategy; 4] = [
    BinaryModule::method_def_target,
    BinaryModule::field_target,
    BinaryModule::member_ref_target,
    BinaryModule::method_spec_target,
];

/// One managed module opened from disk.
pub struct BinaryModule {
    path: PathBuf,
    view: CilAssemblyView,
    name: String,
    core_library: String,
    references: Vec<String>,
    enclosing: HashMap<u32, u32>,
    nested: HashMap<u32, Vec<u32>>,
    interfaces: HashMap<u32, Vec<Token>>,
    type_methods: Vec<Range<u32>>,
    type_fields: Vec<Range<u32>>,
    method_owner: Vec<u32>,
    field_owner: Vec<u32>,
    type_properties: HashMap<u32, Range<u32>>,
    type_events: HashMap<u32, Range<u32>>,
    property_owner: HashMap<u32, u32>,
    event_owner: HashMap<u32, u32>,
    semantics: HashMap<u32, Accessor>,
    accessors: HashMap<u32, Vec<u32>>,
    generated: HashSet<u32>,
    extensions: HashSet<u32>,
    pdb: Option<PortablePdb>,
    docs: Option<XmlDocs>,
}

/// Typed row readers. A row outside its table is [`MetadataError::BadRow`].
macro_rules! row_readers {
    ($($reader:ident: $raw:ty),* $(,)?) => {
        impl BinaryModule {
            $(
                fn $reader(&self, row: u32) -> MetaResult<$raw> {
                    self.tables()?
                        .table::<$raw>()
                        .map(|table| table.get(row))
                        .transpose()?
                        .flatten()
                        .ok_or(MetadataError::BadRow { table: stringify!($raw), row })
                }
            )*
        }
    };
}

row_readers! {
    module_row: ModuleRaw,
    type_ref: TypeRefRaw,
    type_def: TypeDefRaw,
    field: FieldRaw,
    method_def: MethodDefRaw,
    interface_impl: InterfaceImplRaw,
    member_ref: MemberRefRaw,
    custom_attribute: CustomAttributeRaw,
    standalone_sig: StandAloneSigRaw,
    event_map: EventMapRaw,
    event: EventRaw,
    property_map: PropertyMapRaw,
    property: PropertyRaw,
    method_semantics: MethodSemanticsRaw,
    type_spec: TypeSpecRaw,
    assembly: AssemblyRaw,
    assembly_ref: AssemblyRefRaw,
    nested_class: NestedClassRaw,
    method_spec: MethodSpecRaw,
}

impl BinaryModule {
    /// Open a `.dll`/`.exe`. Reads a portable PDB next to it when
    /// `include_locations` is set and an XML doc file when one exists.
    pub fn open(path: &Path, include_locations: bool) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| GraphError::open(path, e))?;
        let mut module = Self::from_bytes(path, data).map_err(|e| GraphError::BadImage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if include_locations {
            let pdb_path = path.with_extension("pdb");
            if pdb_path.exists() {
                match PortablePdb::open(&pdb_path) {
                    Ok(Some(pdb)) => module.pdb = Some(pdb),
                    Ok(None) => debug!(path = %pdb_path.display(), "not a portable pdb"),
                    Err(e) => warn!(path = %pdb_path.display(), error = %e, "skipping unreadable pdb"),
                }
            }
        }
        module.docs = XmlDocs::load(&path.with_extension("xml"));

        debug!(
            module = %module.name,
            types = module.count(TableId::TypeDef),
            methods = module.count(TableId::MethodDef),
            references = module.references.len(),
            "opened module"
        );
        Ok(module)
    }

    fn from_bytes(path: &Path, data: Vec<u8>) -> MetaResult<Self> {
        let mut config = ValidationConfig::disabled();
        config.lenient = true;
        let view = CilAssemblyView::from_mem_with_validation(data, config)?;

        let mut module = Self {
            path: path.to_path_buf(),
            view,
            name: String::new(),
            core_library: String::new(),
            references: Vec::new(),
            enclosing: HashMap::new(),
            nested: HashMap::new(),
            interfaces: HashMap::new(),
            type_methods: Vec::new(),
            type_fields: Vec::new(),
            method_owner: Vec::new(),
            field_owner: Vec::new(),
            type_properties: HashMap::new(),
            type_events: HashMap::new(),
            property_owner: HashMap::new(),
            event_owner: HashMap::new(),
            semantics: HashMap::new(),
            accessors: HashMap::new(),
            generated: HashSet::new(),
            extensions: HashSet::new(),
            pdb: None,
            docs: None,
        };
        module.tables()?;
        module.name = module.read_name()?;
        module.references = module.read_references()?;
        module.core_library = module
            .references
            .iter()
            .find(|r| CORE_LIBRARIES.contains(&r.as_str()))
            .cloned()
            .unwrap_or_else(|| module.name.clone());
        module.index_nesting()?;
        module.index_owners()?;
        module.index_semantics()?;
        module.index_interfaces()?;
        module.index_attributes()?;
        Ok(module)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─── Raw Access ─────────────────────────────────────────────────

    fn tables(&self) -> MetaResult<&TablesHeader<'_>> {
        self.view.tables().ok_or(MetadataError::Missing("#~ stream"))
    }

    fn count(&self, table: TableId) -> u32 {
        self.view.tables().map_or(0, |tables| tables.table_row_count(table))
    }

    fn string(&self, index: u32) -> MetaResult<&str> {
        let strings = self.view.strings().ok_or(MetadataError::Missing("#Strings heap"))?;
        Ok(strings.get(index as usize)?)
    }

    fn blob(&self, index: u32) -> MetaResult<&[u8]> {
        let blobs = self.view.blobs().ok_or(MetadataError::Missing("#Blob heap"))?;
        Ok(blobs.get(index as usize)?)
    }

    fn methods_of(&self, ty: u32) -> Range<u32> {
        self.type_methods
            .get((ty as usize).wrapping_sub(1))
            .cloned()
            .unwrap_or(0..0)
    }

    fn fields_of(&self, ty: u32) -> Range<u32> {
        self.type_fields
            .get((ty as usize).wrapping_sub(1))
            .cloned()
            .unwrap_or(0..0)
    }

    /// Header, locals and decoded IL of the body at `rva`.
    fn decode_body(&self, rva: u32) -> MetaResult<(MethodBody, Vec<Instruction>)> {
        let offset = self
            .view
            .file()
            .rva_to_offset(rva as usize)
            .map_err(|_| MetadataError::BadRva(rva))?;
        let data = self.view.data().get(offset..).ok_or(MetadataError::BadRva(rva))?;
        let (body, _) = MethodBody::from_lenient(data)?;
        let code = body
            .size_header
            .checked_add(body.size_code)
            .and_then(|end| data.get(body.size_header..end))
            .ok_or(MetadataError::BadBody("code runs past the end of the image"))?;
        let instructions = decode_stream(&mut Parser::new(code), u64::from(rva))?;
        Ok((body, instructions))
    }

    // ─── Open-Time Indexes ──────────────────────────────────────────

    fn read_name(&self) -> MetaResult<String> {
        if self.count(TableId::Assembly) > 0 {
            return Ok(self.string(self.assembly(1)?.name)?.to_string());
        }
        let module_name = if self.count(TableId::Module) > 0 {
            self.string(self.module_row(1)?.name)?
        } else {
            ""
        };
        let stem = Path::new(module_name)
            .file_stem()
            .or_else(|| self.path.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(stem)
    }

    fn read_references(&self) -> MetaResult<Vec<String>> {
        let mut references: Vec<String> = Vec::new();
        for row in rows(self.count(TableId::AssemblyRef)) {
            let name = self.string(self.assembly_ref(row)?.name)?;
            if !references.iter().any(|r| r == name) {
                references.push(name.to_string());
            }
        }
        Ok(references)
    }

    /// One enclosing type per nested type. Self-nesting rows are dropped so
    /// walking down from the top-level types always terminates.
    fn index_nesting(&mut self) -> MetaResult<()> {
        for row in rows(self.count(TableId::NestedClass)) {
            let raw = self.nested_class(row)?;
            if raw.nested_class == 0 || raw.nested_class == raw.enclosing_class {
                continue;
            }
            self.enclosing.entry(raw.nested_class).or_insert(raw.enclosing_class);
        }
        for (nested, enclosing) in &self.enclosing {
            self.nested.entry(*enclosing).or_default().push(*nested);
        }
        for children in self.nested.values_mut() {
            children.sort_unstable();
        }
        Ok(())
    }

    fn index_owners(&mut self) -> MetaResult<()> {
        let mut method_starts = Vec::new();
        let mut field_starts = Vec::new();
        for row in rows(self.count(TableId::TypeDef)) {
            let ty = self.type_def(row)?;
            method_starts.push(ty.method_list);
            field_starts.push(ty.field_list);
        }
        let method_count = self.count(TableId::MethodDef);
        let field_count = self.count(TableId::Field);
        self.type_methods = list_ranges(&method_starts, method_count);
        self.type_fields = list_ranges(&field_starts, field_count);

        self.method_owner = vec![0; method_count as usize];
        self.field_owner = vec![0; field_count as usize];
        for (ty, (methods, fields)) in (1..).zip(self.type_methods.iter().zip(&self.type_fields)) {
            for method in methods.clone() {
                if let Some(owner) = self.method_owner.get_mut((method as usize).wrapping_sub(1)) {
                    *owner = ty;
                }
            }
            for field in fields.clone() {
                if let Some(owner) = self.field_owner.get_mut((field as usize).wrapping_sub(1)) {
                    *owner = ty;
                }
            }
        }

        let mut parents = Vec::new();
        let mut starts = Vec::new();
        for row in rows(self.count(TableId::PropertyMap)) {
            let map = self.property_map(row)?;
            parents.push(map.parent);
            starts.push(map.property_list);
        }
        for (parent, properties) in parents.iter().zip(list_ranges(&starts, self.count(TableId::Property))) {
            for property in properties.clone() {
                self.property_owner.insert(property, *parent);
            }
            self.type_properties.insert(*parent, properties);
        }

        parents.clear();
        starts.clear();
        for row in rows(self.count(TableId::EventMap)) {
            let map = self.event_map(row)?;
            parents.push(map.parent);
            starts.push(map.event_list);
        }
        for (parent, events) in parents.iter().zip(list_ranges(&starts, self.count(TableId::Event))) {
            for event in events.clone() {
                self.event_owner.insert(event, *parent);
            }
            self.type_events.insert(*parent, events);
        }
        Ok(())
    }

    fn index_semantics(&mut self) -> MetaResult<()> {
        for row in rows(self.count(TableId::MethodSemantics)) {
            let raw = self.method_semantics(row)?;
            let kind = match raw.association.tag {
                TableId::Property => MemberKind::Property,
                TableId::Event => MemberKind::Event,
                _ => continue,
            };
            let owner = raw.association.token.value();
            self.semantics.insert(raw.method, Accessor { owner, kind });
            self.accessors.entry(owner).or_default().push(raw.method);
        }
        Ok(())
    }

    fn index_interfaces(&mut self) -> MetaResult<()> {
        for row in rows(self.count(TableId::InterfaceImpl)) {
            let raw = self.interface_impl(row)?;
            self.interfaces
                .entry(raw.class)
                .or_default()
                .push(raw.interface.token);
        }
        Ok(())
    }

    /// Record every row that carries `CompilerGeneratedAttribute` or
    /// `ExtensionAttribute`.
    fn index_attributes(&mut self) -> MetaResult<()> {
        let mut known: HashMap<Token, Option<Marker>> = HashMap::new();
        for row in rows(self.count(TableId::CustomAttribute)) {
            let attribute = self.custom_attribute(row)?;
            let ctor = attribute.constructor.token;
            let marker = match known.get(&ctor) {
                Some(marker) => *marker,
                None => {
                    let marker = self.attribute_marker(&attribute.constructor);
                    known.insert(ctor, marker);
                    marker
                }
            };
            let parent = attribute.parent.token.value();
            match marker {
                Some(Marker::CompilerGenerated) => {
                    self.generated.insert(parent);
                }
                Some(Marker::Extension) => {
                    self.extensions.insert(parent);
                }
                None => {}
            }
        }
        Ok(())
    }

    fn attribute_marker(&self, ctor: &CodedIndex) -> Option<Marker> {
        let owner = match ctor.tag {
            TableId::MemberRef => self.member_ref(ctor.row).ok()?.class.token,
            TableId::MethodDef => {
                let owner = self.method_owner.get((ctor.row as usize).wrapping_sub(1))?;
                Token::from_parts(TableId::TypeDef, *owner)
            }
            _ => return None,
        };
        let (namespace, name) = match owner.table() {
            TYPE_REF => {
                let raw = self.type_ref(owner.row()).ok()?;
                (raw.type_namespace, raw.type_name)
            }
            TYPE_DEF => {
                let raw = self.type_def(owner.row()).ok()?;
                (raw.type_namespace, raw.type_name)
            }
            _ => return None,
        };
        if self.string(namespace).ok()? != COMPILER_SERVICES {
            return None;
        }
        match self.string(name).ok()? {
            "CompilerGeneratedAttribute" => Some(Marker::CompilerGenerated),
            "ExtensionAttribute" => Some(Marker::Extension),
            _ => None,
        }
    }

    // ─── Types ──────────────────────────────────────────────────────

    /// Namespace of the outermost type and the raw nesting chain.
    fn nesting_chain(&self, row: u32) -> MetaResult<(String, Vec<String>)> {
        let mut chain = Vec::new();
        let mut current = row;
        loop {
            let ty = self.type_def(current)?;
            chain.push(self.string(ty.type_name)?.to_string());
            match self.enclosing.get(&current) {
                Some(outer) if chain.len() <= MAX_NESTING => current = *outer,
                Some(_) => return Err(MetadataError::BadRow { table: "NestedClassRaw", row }),
                None => {
                    chain.reverse();
                    return Ok((self.string(ty.type_namespace)?.to_string(), chain));
                }
            }
        }
    }

    fn local_type(&self, row: u32) -> MetaResult<NamedType> {
        let (namespace, nesting) = self.nesting_chain(row)?;
        Ok(NamedType {
            module: Some(self.name.clone()),
            namespace,
            nesting,
            generic_args: Vec::new(),
            local: Some(TypeId(row)),
        })
    }

    fn referenced_type(&self, row: u32, depth: usize) -> MetaResult<NamedType> {
        if depth > MAX_NESTING {
            return Err(MetadataError::BadRow { table: "TypeRefRaw", row });
        }
        let raw = self.type_ref(row)?;
        let name = self.string(raw.type_name)?;
        let namespace = self.string(raw.type_namespace)?;
        let scope = &raw.resolution_scope;
        let named = match scope.tag {
            TableId::TypeRef if scope.row != 0 => {
                let mut outer = self.referenced_type(scope.row, depth + 1)?;
                outer.nesting.push(name.to_string());
                outer
            }
            TableId::AssemblyRef if scope.row != 0 => NamedType::new(
                Some(self.string(self.assembly_ref(scope.row)?.name)?.to_string()),
                namespace,
                name,
            ),
            _ => NamedType::new(Some(self.name.clone()), namespace, name),
        };
        Ok(named)
    }

    fn try_resolve_type(&self, token: Token, depth: usize) -> MetaResult<TypeRef> {
        if depth > MAX_NESTING {
            return Err(MetadataError::BadSignature("type nesting too deep"));
        }
        match token.table() {
            TYPE_DEF => Ok(TypeRef::Named(self.local_type(token.row())?)),
            TYPE_REF => Ok(TypeRef::Named(self.referenced_type(token.row(), depth)?)),
            TYPE_SPEC => {
                let spec = self.type_spec(token.row())?;
                signature::type_spec(self.blob(spec.signature)?, self, depth)
            }
            _ => Err(MetadataError::BadRow {
                table: "type token",
                row: token.value(),
            }),
        }
    }

    fn coded_type(&self, coded: &CodedIndex) -> Option<TypeRef> {
        (coded.row != 0).then(|| self.resolve_type(coded.token, 0))
    }

    fn type_doc_id(&self, row: u32) -> MetaResult<String> {
        let (namespace, nesting) = self.nesting_chain(row)?;
        Ok(xmldoc::type_id(&namespace, &nesting))
    }

    fn describe(&self, id: impl FnOnce() -> MetaResult<String>) -> Option<String> {
        let docs = self.docs.as_ref()?;
        docs.get(&id().ok()?)
    }

    /// Earliest located method of the type.
    fn type_location(&self, row: u32) -> Option<SourceLocation> {
        if self.pdb.is_none() {
            return None;
        }
        self.methods_of(row)
            .filter_map(|method| self.method_location(method))
            .min_by_key(|location| location.line)
    }

    fn method_location(&self, row: u32) -> Option<SourceLocation> {
        let (path, line) = self.pdb.as_ref()?.method_location(row)?;
        Some(SourceLocation { path, line })
    }

    // ─── Members ────────────────────────────────────────────────────

    fn owner_of(&self, owners: &[u32], row: u32, member: u32) -> std::result::Result<u32, SymbolError> {
        owners
            .get((row as usize).wrapping_sub(1))
            .copied()
            .filter(|owner| *owner != 0)
            .ok_or(SymbolError::UnknownHandle(member))
    }

    fn method_sig(&self, method: &MethodDefRaw) -> MetaResult<signature::MethodSig> {
        signature::method_sig(self.blob(method.signature)?, self)
    }

    /// Parameterless `.ctor` whose body only chains to the base constructor.
    fn is_implicit_default_ctor(&self, method: &MethodDefRaw, name: &str, param_count: usize) -> bool {
        name == ".ctor" && param_count == 0 && self.has_trivial_body(method)
    }

    fn has_trivial_body(&self, method: &MethodDefRaw) -> bool {
        method.rva != 0
            && self
                .decode_body(method.rva)
                .is_ok_and(|(_, instructions)| is_trivial_constructor(&instructions))
    }

    fn method_symbol(&self, row: u32) -> std::result::Result<MemberSymbol, SymbolError> {
        let id = token(TableId::MethodDef, row);
        let owner = self.owner_of(&self.method_owner, row, id)?;
        let method = self.method_def(row)?;
        let name = self.string(method.name)?;
        let sig = self.method_sig(&method)?;
        let description = self.describe(|| {
            Ok(format!(
                "M:{}",
                xmldoc::member_id(&self.type_doc_id(owner)?, name, sig.generic_count, &sig.params)
            ))
        });
        Ok(MemberSymbol {
            id: MemberId(id),
            declaring_type: TypeId(owner),
            name: name.to_string(),
            kind: MemberKind::Method,
            signature: sig.params.iter().map(TypeRef::display).collect(),
            is_implicit_default_ctor: self.is_implicit_default_ctor(&method, name, sig.params.len()),
            parameters: sig.params,
            value_type: Some(sig.return_type),
            is_constructor: is_constructor_name(name),
            is_private: is_private_access(method.flags),
            is_compiler_generated: self.generated.contains(&id) || names::is_compiler_generated_name(name),
            description,
            location: self.method_location(row),
        })
    }

    fn field_symbol(&self, row: u32) -> std::result::Result<MemberSymbol, SymbolError> {
        let id = token(TableId::Field, row);
        let owner = self.owner_of(&self.field_owner, row, id)?;
        let field = self.field(row)?;
        let name = self.string(field.name)?;
        let ty = signature::field_sig(self.blob(field.signature)?, self)?;
        let description = self.describe(|| Ok(format!("F:{}.{name}", self.type_doc_id(owner)?)));
        Ok(MemberSymbol {
            id: MemberId(id),
            declaring_type: TypeId(owner),
            name: name.to_string(),
            kind: MemberKind::Field,
            signature: Vec::new(),
            parameters: Vec::new(),
            value_type: Some(ty),
            is_constructor: false,
            is_private: is_private_access(field.flags),
            is_compiler_generated: self.generated.contains(&id)
                || field.flags & FIELD_RT_SPECIAL_NAME != 0
                || names::is_compiler_generated_name(name),
            is_implicit_default_ctor: false,
            description,
            location: None,
        })
    }

    fn accessor_rows(&self, owner: u32) -> &[u32] {
        self.accessors.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Private when every accessor is private.
    fn accessors_private(&self, owner: u32) -> bool {
        let rows = self.accessor_rows(owner);
        !rows.is_empty()
            && rows.iter().all(|row| {
                self.method_def(*row)
                    .is_ok_and(|method| is_private_access(method.flags))
            })
    }

    fn accessors_location(&self, owner: u32) -> Option<SourceLocation> {
        self.accessor_rows(owner)
            .iter()
            .filter_map(|row| self.method_location(*row))
            .min_by_key(|location| location.line)
    }

    fn property_symbol(&self, row: u32) -> std::result::Result<MemberSymbol, SymbolError> {
        let id = token(TableId::Property, row);
        let owner = self
            .property_owner
            .get(&row)
            .copied()
            .ok_or(SymbolError::UnknownHandle(id))?;
        let property = self.property(row)?;
        let name = self.string(property.name)?;
        let (ty, params) = signature::property_sig(self.blob(property.signature)?, self)?;
        let description = self.describe(|| {
            Ok(format!("P:{}", xmldoc::member_id(&self.type_doc_id(owner)?, name, 0, &params)))
        });
        Ok(MemberSymbol {
            id: MemberId(id),
            declaring_type: TypeId(owner),
            name: name.to_string(),
            kind: MemberKind::Property,
            signature: params.iter().map(TypeRef::display).collect(),
            parameters: params,
            value_type: Some(ty),
            is_constructor: false,
            is_private: self.accessors_private(id),
            is_compiler_generated: self.generated.contains(&id) || names::is_compiler_generated_name(name),
            is_implicit_default_ctor: false,
            description,
            location: self.accessors_location(id),
        })
    }

    fn event_symbol(&self, row: u32) -> std::result::Result<MemberSymbol, SymbolError> {
        let id = token(TableId::Event, row);
        let owner = self
            .event_owner
            .get(&row)
            .copied()
            .ok_or(SymbolError::UnknownHandle(id))?;
        let event = self.event(row)?;
        let name = self.string(event.name)?;
        let description = self.describe(|| Ok(format!("E:{}.{name}", self.type_doc_id(owner)?)));
        Ok(MemberSymbol {
            id: MemberId(id),
            declaring_type: TypeId(owner),
            name: name.to_string(),
            kind: MemberKind::Event,
            signature: Vec::new(),
            parameters: Vec::new(),
            value_type: self.coded_type(&event.event_type),
            is_constructor: false,
            is_private: self.accessors_private(id),
            is_compiler_generated: self.generated.contains(&id) || names::is_compiler_generated_name(name),
            is_implicit_default_ctor: false,
            description,
            location: self.accessors_location(id),
        })
    }

    // ─── Bodies ─────────────────────────────────────────────────────

    fn method_body_references(
        &self,
        row: u32,
        index: &SymbolIndex,
        out: &mut Vec<BodyReference>,
    ) -> MetaResult<()> {
        let method = self.method_def(row)?;
        if method.rva == 0 {
            return Ok(());
        }
        let (body, instructions) = self.decode_body(method.rva)?;

        let locals = Token::new(body.local_var_sig_token);
        if locals.table() == STANDALONE_SIG && locals.row() != 0 {
            let sig = self.standalone_sig(locals.row())?;
            for local in signature::local_sig(self.blob(sig.signature)?, self)? {
                out.push(BodyReference::Type {
                    target: local,
                    usage: TypeUsage::LocalVariable,
                });
            }
        }
        for handler in &body.exception_handlers {
            if let Some(class) = handler.get_class_token() {
                out.push(BodyReference::Type {
                    target: self.resolve_type(Token::new(class), 0),
                    usage: TypeUsage::Catch,
                });
            }
        }
        for (member, usage) in instructions.iter().filter_map(member_operand) {
            match self.resolve_member(member, index) {
                Some(target) => {
                    let usage = match (target.kind, usage) {
                        (MemberKind::Method, usage) => usage,
                        (_, MemberUsage::Creation) => MemberUsage::Creation,
                        _ => MemberUsage::Access,
                    };
                    out.push(BodyReference::Member { target, usage });
                }
                None => trace!(module = %self.name, token = member.value(), "unresolved member token"),
            }
        }
        Ok(())
    }

    /// Resolve a call or field operand through the ordered strategies.
    fn resolve_member(&self, member: Token, index: &SymbolIndex) -> Option<MemberRef> {
        MEMBER_STRATEGIES
            .iter()
            .find_map(|strategy| strategy(self, member, index))
    }

    fn method_def_target(&self, member: Token, _index: &SymbolIndex) -> Option<MemberRef> {
        if member.table() != METHOD_DEF {
            return None;
        }
        let row = member.row();
        if let Some(accessor) = self.semantics.get(&row) {
            return self.accessor_target(*accessor);
        }
        let owner = self.owner_of(&self.method_owner, row, member.value()).ok()?;
        let method = self.method_def(row).ok()?;
        let name = self.string(method.name).ok()?;
        let sig = self.method_sig(&method).ok()?;
        let mut target = MemberRef::new(self.local_type(owner).ok()?, name, MemberKind::Method);
        target.signature = sig.params.iter().map(TypeRef::display).collect();
        target.local = Some(MemberId(member.value()));
        target.is_constructor = is_constructor_name(name);
        target.is_implicit_default_ctor = self.is_implicit_default_ctor(&method, name, sig.params.len());
        Some(target)
    }

    fn accessor_target(&self, accessor: Accessor) -> Option<MemberRef> {
        let owner_token = Token::new(accessor.owner);
        let row = owner_token.row();
        let (owner, name) = match owner_token.table() {
            PROPERTY => (*self.property_owner.get(&row)?, self.property(row).ok()?.name),
            EVENT => (*self.event_owner.get(&row)?, self.event(row).ok()?.name),
            _ => return None,
        };
        let name = self.string(name).ok()?;
        let mut target = MemberRef::new(self.local_type(owner).ok()?, name, accessor.kind);
        target.local = Some(MemberId(accessor.owner));
        Some(target)
    }

    fn field_target(&self, member: Token, _index: &SymbolIndex) -> Option<MemberRef> {
        if member.table() != FIELD {
            return None;
        }
        let row = member.row();
        let owner = self.owner_of(&self.field_owner, row, member.value()).ok()?;
        let name = self.string(self.field(row).ok()?.name).ok()?;
        let mut target = MemberRef::new(self.local_type(owner).ok()?, name, MemberKind::Field);
        target.local = Some(MemberId(member.value()));
        Some(target)
    }

    fn member_ref_target(&self, member: Token, index: &SymbolIndex) -> Option<MemberRef> {
        if member.table() != MEMBER_REF {
            return None;
        }
        let raw = self.member_ref(member.row()).ok()?;
        let parent = &raw.class;
        let declaring = match parent.tag {
            TableId::MethodDef => return self.method_def_target(parent.token, index),
            TableId::TypeDef | TableId::TypeRef | TableId::TypeSpec => {
                match self.resolve_type(parent.token, 0) {
                    TypeRef::Named(named) => named,
                    _ => return None,
                }
            }
            _ => return None,
        };
        let name = self.string(raw.name).ok()?;
        let blob = self.blob(raw.signature).ok()?;

        if signature::is_field_sig(blob) {
            if let Some(local) = declaring.local.and_then(|ty| self.local_field(ty.0, name)) {
                return self.field_target(Token::from_parts(TableId::Field, local), index);
            }
            return Some(MemberRef::new(declaring, name, MemberKind::Field));
        }

        let sig = signature::method_sig(blob, self).ok()?;
        let signature: Vec<String> = sig.params.iter().map(TypeRef::display).collect();
        if let Some(local) = declaring
            .local
            .and_then(|ty| self.local_method(ty.0, name, &signature))
        {
            let mut target = self.method_def_target(Token::from_parts(TableId::MethodDef, local), index)?;
            if target.kind == MemberKind::Method {
                target.declaring.generic_args = declaring.generic_args;
            }
            return Some(target);
        }

        let mut target = MemberRef::new(declaring, name, MemberKind::Method);
        target.signature = signature;
        target.is_constructor = is_constructor_name(name);
        Some(classify_external(target, index))
    }

    fn method_spec_target(&self, member: Token, index: &SymbolIndex) -> Option<MemberRef> {
        if member.table() != METHOD_SPEC {
            return None;
        }
        let raw = self.method_spec(member.row()).ok()?;
        let mut target = match raw.method.tag {
            TableId::MethodDef => self.method_def_target(raw.method.token, index),
            TableId::MemberRef => self.member_ref_target(raw.method.token, index),
            _ => None,
        }?;
        let blob = self.blob(raw.instantiation).ok()?;
        target.generic_args = signature::method_spec(blob, self).ok()?;
        Some(target)
    }

    fn local_field(&self, ty: u32, name: &str) -> Option<u32> {
        self.fields_of(ty).find(|row| {
            self.field(*row)
                .ok()
                .and_then(|field| self.string(field.name).ok())
                .is_some_and(|n| n == name)
        })
    }

    fn local_method(&self, ty: u32, name: &str, signature: &[String]) -> Option<u32> {
        self.methods_of(ty).find(|row| {
            let Ok(method) = self.method_def(*row) else {
                return false;
            };
            self.string(method.name).is_ok_and(|n| n == name)
                && self.method_sig(&method).is_ok_and(|sig| {
                    sig.params.iter().map(TypeRef::display).eq(signature.iter().cloned())
                })
        })
    }

    fn exported_type(&self, row: u32) -> MetaResult<ExportedType> {
        let (namespace, nesting) = self.nesting_chain(row)?;
        let ty = self.type_def(row)?;
        let mut members = Vec::new();
        let mut has_explicit_default_ctor = false;

        for method_row in self.methods_of(row) {
            if self.semantics.contains_key(&method_row) {
                continue;
            }
            let method = self.method_def(method_row)?;
            let name = self.string(method.name)?;
            let Ok(sig) = self.method_sig(&method) else {
                continue;
            };
            if name == ".ctor" && sig.params.is_empty() && !self.has_trivial_body(&method) {
                has_explicit_default_ctor = true;
            }
            let id = token(TableId::MethodDef, method_row);
            members.push(ExportedMember {
                id: MemberId(id),
                name: name.to_string(),
                kind: MemberKind::Method,
                signature: sig.params.iter().map(TypeRef::display).collect(),
                value_type: Some(TypeExpr::Resolved(sig.return_type)),
                is_constructor: is_constructor_name(name),
                is_static: method.flags & METHOD_STATIC != 0,
                is_extension: self.extensions.contains(&id),
            });
        }
        for field_row in self.fields_of(row) {
            let field = self.field(field_row)?;
            let ty = self
                .blob(field.signature)
                .and_then(|blob| signature::field_sig(blob, self))
                .ok();
            members.push(ExportedMember {
                id: MemberId(token(TableId::Field, field_row)),
                name: self.string(field.name)?.to_string(),
                kind: MemberKind::Field,
                signature: Vec::new(),
                value_type: ty.map(TypeExpr::Resolved),
                is_constructor: false,
                is_static: field.flags & FIELD_STATIC != 0,
                is_extension: false,
            });
        }
        for property_row in self.type_properties.get(&row).cloned().unwrap_or(0..0) {
            let property = self.property(property_row)?;
            let ty = self
                .blob(property.signature)
                .and_then(|blob| signature::property_sig(blob, self))
                .ok()
                .map(|(ty, _)| TypeExpr::Resolved(ty));
            members.push(ExportedMember {
                id: MemberId(token(TableId::Property, property_row)),
                name: self.string(property.name)?.to_string(),
                kind: MemberKind::Property,
                signature: Vec::new(),
                value_type: ty,
                is_constructor: false,
                is_static: false,
                is_extension: false,
            });
        }
        for event_row in self.type_events.get(&row).cloned().unwrap_or(0..0) {
            let event = self.event(event_row)?;
            members.push(ExportedMember {
                id: MemberId(token(TableId::Event, event_row)),
                name: self.string(event.name)?.to_string(),
                kind: MemberKind::Event,
                signature: Vec::new(),
                value_type: self.coded_type(&event.event_type).map(TypeExpr::Resolved),
                is_constructor: false,
                is_static: false,
                is_extension: false,
            });
        }

        Ok(ExportedType {
            id: TypeId(row),
            namespace,
            nesting,
            base: self.coded_type(&ty.extends).map(TypeExpr::Resolved),
            members,
            has_explicit_default_ctor,
            is_interface: ty.flags & TYPE_INTERFACE != 0,
        })
    }
}

/// Fold `get_X`/`set_X`/`add_X`/`remove_X` on a type from another module.
///
/// The target module's exports decide when they are available; otherwise
/// getters and setters are assumed to be property accessors. Parameterless
/// constructors of exported types without an explicit one are marked implicit.
fn classify_external(mut target: MemberRef, index: &SymbolIndex) -> MemberRef {
    let exported = target
        .declaring
        .module
        .as_deref()
        .and_then(|module| index.type_in(module, &target.declaring.key()));

    if target.name == ".ctor" && target.signature.is_empty() {
        target.is_implicit_default_ctor = exported.is_some_and(|ty| !ty.has_explicit_default_ctor);
        return target;
    }

    let Some((prefix, property)) = ["get_", "set_", "add_", "remove_"]
        .iter()
        .find_map(|prefix| target.name.strip_prefix(prefix).map(|rest| (*prefix, rest)))
    else {
        return target;
    };
    let kind = match exported {
        Some(ty) => ty
            .members_named(property)
            .find(|m| matches!(m.kind, MemberKind::Property | MemberKind::Event))
            .map(|m| m.kind),
        None => matches!(prefix, "get_" | "set_").then_some(MemberKind::Property),
    };
    if let Some(kind) = kind {
        target.name = property.to_string();
        target.kind = kind;
        target.signature.clear();
    }
    target
}

impl TokenResolver for BinaryModule {
    fn resolve_type(&self, token: Token, depth: usize) -> TypeRef {
        self.try_resolve_type(token, depth).unwrap_or_else(|e| {
            trace!(module = %self.name, token = token.value(), error = %e, "unresolvable type token");
            TypeRef::Named(NamedType::new(None, "", "?"))
        })
    }

    fn core_library(&self) -> &str {
        &self.core_library
    }
}

impl SymbolAdapter for BinaryModule {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn references(&self) -> &[String] {
        &self.references
    }

    fn files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.path.clone()];
        for extension in ["pdb", "xml"] {
            let sibling = self.path.with_extension(extension);
            if sibling.exists() {
                files.push(sibling);
            }
        }
        files
    }

    fn exports(&self) -> ExportTable {
        let mut table = ExportTable::new(self.name.clone());
        for row in rows(self.count(TableId::TypeDef)) {
            match self.exported_type(row) {
                Ok(ty) if ty.nesting.first().is_some_and(|n| n == "<Module>") => {}
                Ok(ty) => table.insert(super::export_key(&ty.namespace, &ty.nesting), ty),
                Err(e) => warn!(module = %self.name, row, error = %e, "skipping unreadable type export"),
            }
        }
        table
    }

    fn top_level_types(&self) -> Vec<TypeId> {
        rows(self.count(TableId::TypeDef))
            .filter(|row| !self.enclosing.contains_key(row))
            .filter(|row| {
                self.type_def(*row)
                    .and_then(|ty| self.string(ty.type_name))
                    .is_ok_and(|name| name != "<Module>")
            })
            .map(TypeId)
            .collect()
    }

    fn nested_types(&self, ty: TypeId) -> Vec<TypeId> {
        self.nested
            .get(&ty.0)
            .map(|rows| rows.iter().copied().map(TypeId).collect())
            .unwrap_or_default()
    }

    fn type_symbol(&self, ty: TypeId, _index: &SymbolIndex) -> std::result::Result<TypeSymbol, SymbolError> {
        let row = ty.0;
        let (namespace, nesting) = self.nesting_chain(row)?;
        let base_type = self.coded_type(&self.type_def(row)?.extends);
        let interfaces = self
            .interfaces
            .get(&row)
            .map(|tokens| tokens.iter().map(|t| self.resolve_type(*t, 0)).collect())
            .unwrap_or_default();
        let is_compiler_generated = self.generated.contains(&token(TableId::TypeDef, row))
            || nesting.iter().any(|n| names::is_compiler_generated_name(n));
        let description = self.describe(|| Ok(format!("T:{}", xmldoc::type_id(&namespace, &nesting))));
        Ok(TypeSymbol {
            id: ty,
            declaring_type: self.enclosing.get(&row).copied().map(TypeId),
            base_type,
            interfaces,
            is_compiler_generated,
            description,
            location: self.type_location(row),
            namespace,
            nesting,
        })
    }

    fn members(&self, ty: TypeId) -> Vec<MemberId> {
        let row = ty.0;
        let properties = self.type_properties.get(&row).cloned().unwrap_or(0..0);
        let events = self.type_events.get(&row).cloned().unwrap_or(0..0);

        self.fields_of(row)
            .map(|r| token(TableId::Field, r))
            .chain(properties.map(|r| token(TableId::Property, r)))
            .chain(events.map(|r| token(TableId::Event, r)))
            .chain(
                self.methods_of(row)
                    .filter(|r| !self.semantics.contains_key(r))
                    .map(|r| token(TableId::MethodDef, r)),
            )
            .map(MemberId)
            .collect()
    }

    fn member_symbol(
        &self,
        member: MemberId,
        _index: &SymbolIndex,
    ) -> std::result::Result<MemberSymbol, SymbolError> {
        let handle = Token::new(member.0);
        match handle.table() {
            METHOD_DEF => self.method_symbol(handle.row()),
            FIELD => self.field_symbol(handle.row()),
            PROPERTY => self.property_symbol(handle.row()),
            EVENT => self.event_symbol(handle.row()),
            _ => Err(SymbolError::UnknownHandle(member.0)),
        }
    }

    fn has_body(&self, member: MemberId) -> bool {
        let handle = Token::new(member.0);
        let has_rva = |method: u32| self.method_def(method).is_ok_and(|m| m.rva != 0);
        match handle.table() {
            METHOD_DEF => has_rva(handle.row()),
            PROPERTY | EVENT => self.accessor_rows(member.0).iter().any(|m| has_rva(*m)),
            _ => false,
        }
    }

    fn body(
        &self,
        member: MemberId,
        index: &SymbolIndex,
    ) -> std::result::Result<Vec<BodyReference>, SymbolError> {
        let handle = Token::new(member.0);
        let mut references = Vec::new();
        match handle.table() {
            METHOD_DEF => self.method_body_references(handle.row(), index, &mut references)?,
            PROPERTY | EVENT => {
                // one broken accessor does not hide the others
                for method in self.accessor_rows(member.0) {
                    if let Err(e) = self.method_body_references(*method, index, &mut references) {
                        warn!(module = %self.name, owner = member.0, accessor = method, error = %e, "skipping unreadable accessor body");
                    }
                }
            }
            _ => {}
        }
        Ok(references)
    }

    fn find_method(&self, ty: TypeId, name: &str) -> Option<MemberId> {
        self.methods_of(ty.0)
            .find(|row| {
                self.method_def(*row)
                    .and_then(|method| self.string(method.name))
                    .is_ok_and(|n| n == name)
            })
            .map(|row| MemberId(token(TableId::MethodDef, row)))
    }
}
