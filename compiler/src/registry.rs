// registry.rs — Data type registry
//
// Maps base-type identifiers to socket descriptions: the single and list port
// kinds of a type, how values of the type are copied, and which implicit
// conversions the host graph allows between types. Ships a built-in type set
// and can be extended from JSON registry files.
//
// Preconditions: none.
// Postconditions: every registered name is a non-empty base identifier (never
//   a list id); every conversion references registered types.
// Failure modes: unreadable file, malformed JSON, duplicate type, conversion
//   naming an unknown type → `RegistryError`.
// Side effects: `load_json` reads the file system.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::graph::Port;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Suffix distinguishing a list kind id from its base id (`"Float List"`).
pub const LIST_SUFFIX: &str = " List";

/// Base type used for freshly created generic nodes.
pub const DEFAULT_BASE_TYPE: &str = "Float";

const BUILTIN_ORIGIN: &str = "<builtin>";

/// An atomic data kind (`Float`, `Vector`, `Text`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseType(String);

impl BaseType {
    pub fn new(name: impl Into<String>) -> Self {
        BaseType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concrete kind of a port: one value of a base type, or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortKind {
    Single(BaseType),
    List(BaseType),
}

impl PortKind {
    pub fn base(&self) -> &BaseType {
        match self {
            PortKind::Single(b) | PortKind::List(b) => b,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, PortKind::List(_))
    }

    /// Textual id: `"Vector"` or `"Vector List"`.
    pub fn id(&self) -> String {
        match self {
            PortKind::Single(b) => b.to_string(),
            PortKind::List(b) => format!("{}{}", b, LIST_SUFFIX),
        }
    }

    /// Syntactic parse of a kind id. Does not check registration.
    pub fn parse(id: &str) -> Option<PortKind> {
        let id = id.trim();
        match id.strip_suffix(LIST_SUFFIX) {
            Some(base) if !base.trim().is_empty() => {
                Some(PortKind::List(BaseType::new(base.trim())))
            }
            Some(_) => None,
            None if !id.is_empty() => Some(PortKind::Single(BaseType::new(id))),
            None => None,
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

// ── Socket descriptions ─────────────────────────────────────────────────────

/// How a socket produces an independent duplicate of a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStrategy {
    /// Value type; sharing one value between slots is safe.
    Immutable,
    /// `value.<name>()`
    Method(String),
    /// `<name>(value)`
    Function(String),
    /// Mutable type the socket cannot duplicate.
    Unsupported,
}

/// A bare copy expression over a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyExpr {
    Method(String),
    Function(String),
}

impl CopyExpr {
    /// Render the expression over the variable `value`.
    pub fn apply(&self, value: &str) -> String {
        match self {
            CopyExpr::Method(name) => format!("{}.{}()", value, name),
            CopyExpr::Function(name) => format!("{}({})", name, value),
        }
    }
}

/// Why a copy expression could not be produced for a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyError {
    /// The port's base type has no registered socket.
    UnknownSocket(String),
    /// Copies are only defined for single-value ports.
    ListPort(String),
    /// The socket is registered but declares no copy operation.
    Unsupported(BaseType),
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyError::UnknownSocket(id) => write!(f, "no socket registered for '{}'", id),
            CopyError::ListPort(id) => write!(f, "cannot copy elements of list port '{}'", id),
            CopyError::Unsupported(base) => {
                write!(f, "socket '{}' declares no copy operation", base)
            }
        }
    }
}

impl std::error::Error for CopyError {}

/// One registered base type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: BaseType,
    pub copy: CopyStrategy,
}

/// On-disk registry extension.
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    types: Vec<TypeDef>,
    #[serde(default)]
    conversions: Vec<(BaseType, BaseType)>,
}

/// Errors that can occur during registry loading.
#[derive(Debug)]
pub enum RegistryError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        file: PathBuf,
        message: String,
    },
    DuplicateType {
        name: BaseType,
        first: PathBuf,
        second: PathBuf,
    },
    UnknownConversionType {
        file: PathBuf,
        name: BaseType,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::IoError { path, source } => {
                write!(f, "{}: {}", path.display(), source)
            }
            RegistryError::ParseError { file, message } => {
                write!(f, "{}: {}", file.display(), message)
            }
            RegistryError::DuplicateType {
                name,
                first,
                second,
            } => {
                write!(
                    f,
                    "duplicate type '{}': first defined in {}, redefined in {}",
                    name,
                    first.display(),
                    second.display()
                )
            }
            RegistryError::UnknownConversionType { file, name } => {
                write!(
                    f,
                    "{}: conversion references unknown type '{}'",
                    file.display(),
                    name
                )
            }
        }
    }
}

impl std::error::Error for RegistryError {}

// ── Registry ────────────────────────────────────────────────────────────────

/// Data type registry. Starts empty or with the built-in set.
#[derive(Debug, Clone)]
pub struct Registry {
    types: BTreeMap<BaseType, (TypeDef, PathBuf)>,
    conversions: BTreeSet<(BaseType, BaseType)>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            types: BTreeMap::new(),
            conversions: BTreeSet::new(),
        }
    }

    /// Registry pre-populated with the standard sockets.
    pub fn with_builtins() -> Self {
        let mut reg = Registry::new();
        let builtin = Path::new(BUILTIN_ORIGIN);
        let method = |name: &str| CopyStrategy::Method(name.to_string());
        let defs = [
            ("Boolean", CopyStrategy::Immutable),
            ("Float", CopyStrategy::Immutable),
            ("Integer", CopyStrategy::Immutable),
            ("Matrix", method("copy")),
            ("Object", CopyStrategy::Immutable),
            ("Spline", method("copy")),
            ("Text", CopyStrategy::Immutable),
            ("Vector", method("copy")),
        ];
        for (name, copy) in defs {
            let name = BaseType::new(name);
            reg.types
                .insert(name.clone(), (TypeDef { name, copy }, builtin.to_path_buf()));
        }
        for (from, to) in [("Integer", "Float"), ("Boolean", "Integer")] {
            reg.conversions
                .insert((BaseType::new(from), BaseType::new(to)));
        }
        reg
    }

    /// Load a JSON registry extension. Returns the number of types added.
    pub fn load_json(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let source = std::fs::read_to_string(path).map_err(|e| RegistryError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.load_json_str(&source, path)
    }

    /// Load a JSON registry extension from memory. `origin` names the source
    /// in error messages. Nothing is registered when an error is returned.
    pub fn load_json_str(&mut self, source: &str, origin: &Path) -> Result<usize, RegistryError> {
        let file: RegistryFile =
            serde_json::from_str(source).map_err(|e| RegistryError::ParseError {
                file: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut added: BTreeMap<BaseType, TypeDef> = BTreeMap::new();
        for def in file.types {
            validate_name(&def.name, origin)?;
            let first = match self.types.get(&def.name) {
                Some((_, first)) => Some(first.clone()),
                None if added.contains_key(&def.name) => Some(origin.to_path_buf()),
                None => None,
            };
            if let Some(first) = first {
                return Err(RegistryError::DuplicateType {
                    name: def.name,
                    first,
                    second: origin.to_path_buf(),
                });
            }
            added.insert(def.name.clone(), def);
        }

        for (from, to) in &file.conversions {
            for name in [from, to] {
                if !self.types.contains_key(name) && !added.contains_key(name) {
                    return Err(RegistryError::UnknownConversionType {
                        file: origin.to_path_buf(),
                        name: name.clone(),
                    });
                }
            }
        }

        let count = added.len();
        for (name, def) in added {
            self.types.insert(name, (def, origin.to_path_buf()));
        }
        self.conversions.extend(file.conversions);
        Ok(count)
    }

    pub fn lookup(&self, base: &BaseType) -> Option<&TypeDef> {
        self.types.get(base).map(|(def, _)| def)
    }

    pub fn contains(&self, base: &BaseType) -> bool {
        self.types.contains_key(base)
    }

    /// Registered base types in name order.
    pub fn base_type_items(&self) -> impl Iterator<Item = &BaseType> {
        self.types.keys()
    }

    /// `Float` when registered, otherwise the first registered type.
    pub fn default_base_type(&self) -> Option<BaseType> {
        let preferred = BaseType::new(DEFAULT_BASE_TYPE);
        if self.contains(&preferred) {
            return Some(preferred);
        }
        self.types.keys().next().cloned()
    }

    /// True for registered single-value ids; false for list ids.
    pub fn is_base_type(&self, id: &str) -> bool {
        matches!(self.kind_of(id), Some(PortKind::Single(_)))
    }

    /// Base type of a registered single or list id.
    pub fn base_type_of(&self, id: &str) -> Option<BaseType> {
        self.kind_of(id).map(|kind| kind.base().clone())
    }

    /// Parse a kind id and check that its base type is registered.
    pub fn kind_of(&self, id: &str) -> Option<PortKind> {
        // A registered name wins over the list reading of the same text.
        let trimmed = id.trim();
        let exact = BaseType::new(trimmed);
        if self.contains(&exact) {
            return Some(PortKind::Single(exact));
        }
        PortKind::parse(trimmed).filter(|kind| self.contains(kind.base()))
    }

    pub fn single_port_kind(&self, base: &BaseType) -> PortKind {
        PortKind::Single(base.clone())
    }

    pub fn list_port_kind(&self, base: &BaseType) -> PortKind {
        PortKind::List(base.clone())
    }

    /// Declared implicit conversion between two base types (not transitive).
    pub fn can_convert(&self, from: &BaseType, to: &BaseType) -> bool {
        from == to || self.conversions.contains(&(from.clone(), to.clone()))
    }

    /// Whether data produced as `from` may flow into a port of kind `to`.
    pub fn is_compatible(&self, from: &PortKind, to: &PortKind) -> bool {
        match (from, to) {
            (PortKind::Single(a), PortKind::Single(b)) | (PortKind::List(a), PortKind::List(b)) => {
                self.can_convert(a, b)
            }
            _ => false,
        }
    }

    /// Copy expression for one port instance. `Ok(None)` means the type is a
    /// value type and needs no copy.
    pub fn copy_expression_for(&self, port: &Port) -> Result<Option<CopyExpr>, CopyError> {
        let base = match &port.kind {
            PortKind::Single(base) => base,
            PortKind::List(_) => return Err(CopyError::ListPort(port.kind.id())),
        };
        let def = self
            .lookup(base)
            .ok_or_else(|| CopyError::UnknownSocket(port.kind.id()))?;
        match &def.copy {
            CopyStrategy::Immutable => Ok(None),
            CopyStrategy::Method(name) => Ok(Some(CopyExpr::Method(name.clone()))),
            CopyStrategy::Function(name) => Ok(Some(CopyExpr::Function(name.clone()))),
            CopyStrategy::Unsupported => Err(CopyError::Unsupported(base.clone())),
        }
    }

    /// Compact JSON of the registered types and conversions, in name order.
    pub fn canonical_json(&self) -> String {
        #[derive(Serialize)]
        struct Canonical<'a> {
            types: Vec<&'a TypeDef>,
            conversions: Vec<&'a (BaseType, BaseType)>,
        }
        let canonical = Canonical {
            types: self.types.values().map(|(def, _)| def).collect(),
            conversions: self.conversions.iter().collect(),
        };
        serde_json::to_string(&canonical).unwrap_or_default()
    }

    /// SHA-256 of `canonical_json`, hex encoded.
    pub fn fingerprint(&self) -> String {
        sha256_hex(self.canonical_json().as_bytes())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn validate_name(name: &BaseType, file: &Path) -> Result<(), RegistryError> {
    let text = name.as_str();
    let message = if text.trim().is_empty() {
        "type name must not be empty".to_string()
    } else if text != text.trim() {
        format!("type name '{}' has surrounding whitespace", text)
    } else if text.ends_with(LIST_SUFFIX) {
        format!("type name '{}' collides with a list kind id", text)
    } else {
        return Ok(());
    };
    Err(RegistryError::ParseError {
        file: file.to_path_buf(),
        message,
    })
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write;

    let digest = Sha256::digest(data);
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

// ── Tests ───────────────────────────────────────────────────────────────────
