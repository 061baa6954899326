//! Generic get/set of named attributes on typed records. Each record kind
//! carries a static attribute table; textual updates are parsed according
//! to the declared kind, and result rows are serialized back through the
//! same table.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{GatewayError, Result};

/// Name-to-identifier lookup against the caller's searchable catalog,
/// consulted when an identifier attribute is not a literal UUID.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Uuid>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Text,
    Identifier,
    Boolean,
    Integer,
    Real,
    Timestamp,
    TextList,
    IdentifierList,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Identifier(Uuid),
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Timestamp(DateTime<Utc>),
    TextList(Vec<String>),
    IdentifierList(Vec<Uuid>),
}

impl AttributeValue {
    /// Renders the value as zero or more strings. Scalars yield at most
    /// one string (the empty string is skipped); list elements each
    /// become one string, empties skipped.
    fn render(&self) -> Vec<String> {
        match self {
            Self::Text(text) if text.is_empty() => Vec::new(),
            Self::Text(text) => vec![text.clone()],
            Self::Identifier(id) => vec![id.to_string()],
            Self::Boolean(value) => vec![value.to_string()],
            Self::Integer(value) => vec![value.to_string()],
            Self::Real(value) => vec![value.to_string()],
            Self::Timestamp(value) => vec![value.to_rfc3339()],
            Self::TextList(items) => items.iter().filter(|s| !s.is_empty()).cloned().collect(),
            Self::IdentifierList(ids) => ids.iter().map(Uuid::to_string).collect(),
        }
    }
}

pub struct AttributeSpec<R> {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub get: fn(&R) -> Option<AttributeValue>,
    pub set: fn(&mut R, AttributeValue),
}

/// A record with a static attribute table.
pub trait Mapped: Sized + 'static {
    const ATTRIBUTES: &'static [AttributeSpec<Self>];
}

fn spec_for<R: Mapped>(name: &str) -> Option<&'static AttributeSpec<R>> {
    R::ATTRIBUTES.iter().find(|spec| spec.name == name)
}

/// Looks up `name` on the record; absent, unset, and empty attributes all
/// yield an empty sequence.
pub fn get_values<R: Mapped>(record: &R, name: &str) -> Vec<String> {
    spec_for::<R>(name)
        .and_then(|spec| (spec.get)(record))
        .map(|value| value.render())
        .unwrap_or_default()
}

/// Parses a literal UUID, falling back to the resolver's name lookup.
pub fn resolve_identifier(text: &str, resolver: &dyn NameResolver) -> Result<Uuid> {
    let text = text.trim();
    if let Ok(id) = Uuid::parse_str(text) {
        return Ok(id);
    }
    resolver
        .resolve(text)
        .ok_or_else(|| GatewayError::Resolution(text.to_string()))
}

/// Parses `text` per the attribute's declared kind and assigns it.
/// Boolean, integer, real, and timestamp parse failures leave the
/// attribute unchanged; only identifier resolution fails loudly, and only
/// after the secondary name lookup also came up empty. Unknown attribute
/// names are ignored.
pub fn set_value<R: Mapped>(
    record: &mut R,
    name: &str,
    text: &str,
    resolver: &dyn NameResolver,
) -> Result<()> {
    let Some(spec) = spec_for::<R>(name) else {
        return Ok(());
    };
    let value = match spec.kind {
        AttributeKind::Text => Some(AttributeValue::Text(text.to_string())),
        AttributeKind::Identifier => {
            Some(AttributeValue::Identifier(resolve_identifier(text, resolver)?))
        }
        AttributeKind::Boolean => text.trim().parse().ok().map(AttributeValue::Boolean),
        AttributeKind::Integer => text.trim().parse().ok().map(AttributeValue::Integer),
        AttributeKind::Real => text.trim().parse().ok().map(AttributeValue::Real),
        AttributeKind::Timestamp => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|ts| AttributeValue::Timestamp(ts.with_timezone(&Utc))),
        AttributeKind::TextList => Some(AttributeValue::TextList(
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        AttributeKind::IdentifierList => {
            let mut ids = Vec::new();
            for part in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                ids.push(resolve_identifier(part, resolver)?);
            }
            Some(AttributeValue::IdentifierList(ids))
        }
    };
    if let Some(value) = value {
        (spec.set)(record, value);
    }
    Ok(())
}

/// Routes a comma-delimited `name, value` pair stream to `set_value`,
/// trimming whitespace around every token.
pub fn apply_updates<R: Mapped>(
    record: &mut R,
    updates: &str,
    resolver: &dyn NameResolver,
) -> Result<()> {
    let mut tokens = updates.split(',').map(str::trim);
    while let (Some(name), Some(value)) = (tokens.next(), tokens.next()) {
        set_value(record, name, value, resolver)?;
    }
    Ok(())
}

/// Builds a result row from the requested attribute names. Names that
/// resolve to zero values are omitted entirely; multi-valued attributes
/// are joined with commas.
pub fn to_row<R: Mapped, S: AsRef<str>>(record: &R, names: &[S]) -> Vec<(String, String)> {
    let mut row = Vec::new();
    for name in names {
        let name = name.as_ref();
        let values = get_values(record, name);
        if values.is_empty() {
            continue;
        }
        row.push((name.to_string(), values.join(",")));
    }
    row
}

/// An inventory entry as the world reports it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryItem {
    pub id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub created: Option<DateTime<Utc>>,
    pub sale_price: Option<i64>,
    pub temporary: Option<bool>,
}

impl Mapped for InventoryItem {
    const ATTRIBUTES: &'static [AttributeSpec<Self>] = &[
        AttributeSpec {
            name: "item",
            kind: AttributeKind::Identifier,
            get: |r| r.id.map(AttributeValue::Identifier),
            set: |r, v| {
                if let AttributeValue::Identifier(id) = v {
                    r.id = Some(id);
                }
            },
        },
        AttributeSpec {
            name: "name",
            kind: AttributeKind::Text,
            get: |r| Some(AttributeValue::Text(r.name.clone())),
            set: |r, v| {
                if let AttributeValue::Text(text) = v {
                    r.name = text;
                }
            },
        },
        AttributeSpec {
            name: "description",
            kind: AttributeKind::Text,
            get: |r| Some(AttributeValue::Text(r.description.clone())),
            set: |r, v| {
                if let AttributeValue::Text(text) = v {
                    r.description = text;
                }
            },
        },
        AttributeSpec {
            name: "created",
            kind: AttributeKind::Timestamp,
            get: |r| r.created.map(AttributeValue::Timestamp),
            set: |r, v| {
                if let AttributeValue::Timestamp(ts) = v {
                    r.created = Some(ts);
                }
            },
        },
        AttributeSpec {
            name: "saleprice",
            kind: AttributeKind::Integer,
            get: |r| r.sale_price.map(AttributeValue::Integer),
            set: |r, v| {
                if let AttributeValue::Integer(value) = v {
                    r.sale_price = Some(value);
                }
            },
        },
        AttributeSpec {
            name: "temporary",
            kind: AttributeKind::Boolean,
            get: |r| r.temporary.map(AttributeValue::Boolean),
            set: |r, v| {
                if let AttributeValue::Boolean(value) = v {
                    r.temporary = Some(value);
                }
            },
        },
    ];
}

/// Parcel details returned by a parcel info query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParcelInfo {
    pub name: String,
    pub description: String,
    pub owner: Option<Uuid>,
    pub area: Option<i64>,
    pub music_url: String,
}

impl Mapped for ParcelInfo {
    const ATTRIBUTES: &'static [AttributeSpec<Self>] = &[
        AttributeSpec {
            name: "name",
            kind: AttributeKind::Text,
            get: |r| Some(AttributeValue::Text(r.name.clone())),
            set: |r, v| {
                if let AttributeValue::Text(text) = v {
                    r.name = text;
                }
            },
        },
        AttributeSpec {
            name: "description",
            kind: AttributeKind::Text,
            get: |r| Some(AttributeValue::Text(r.description.clone())),
            set: |r, v| {
                if let AttributeValue::Text(text) = v {
                    r.description = text;
                }
            },
        },
        AttributeSpec {
            name: "owner",
            kind: AttributeKind::Identifier,
            get: |r| r.owner.map(AttributeValue::Identifier),
            set: |r, v| {
                if let AttributeValue::Identifier(id) = v {
                    r.owner = Some(id);
                }
            },
        },
        AttributeSpec {
            name: "area",
            kind: AttributeKind::Integer,
            get: |r| r.area.map(AttributeValue::Integer),
            set: |r, v| {
                if let AttributeValue::Integer(value) = v {
                    r.area = Some(value);
                }
            },
        },
        AttributeSpec {
            name: "musicurl",
            kind: AttributeKind::Text,
            get: |r| Some(AttributeValue::Text(r.music_url.clone())),
            set: |r, v| {
                if let AttributeValue::Text(text) = v {
                    r.music_url = text;
                }
            },
        },
    ];
}
