//! Component sync wire protocol.
//!
//! Clients talk to the core through generic messages: a method name plus an
//! ordered list of fields. The host delivers them in one of two shapes,
//! binary fields or text fields, and three methods are understood:
//!
//! | method     | shape  | fields                                                |
//! |------------|--------|-------------------------------------------------------|
//! | `ecsync`   | binary | entity id, type, name, payload fragment, fragment...  |
//! | `ecstring` | text   | entity id, type, name, payload text                   |
//! | `ecremove` | text   | entity id, type, name                                 |
//!
//! The transport caps the size of a single field, so binary payloads arrive
//! split across trailing fragments which are concatenated in order.
//! Method names are case-insensitive. Anything else is ignored.

use ecsync_types::{ClientId, Component, ComponentKey, EntityId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Binary component update, payload split over trailing fragments.
pub const METHOD_SYNC: &str = "ecsync";
/// Text component update.
pub const METHOD_STRING: &str = "ecstring";
/// Component removal.
pub const METHOD_REMOVE: &str = "ecremove";

/// Largest field the generic-message transport carries (one-byte length).
pub const DEFAULT_MAX_FIELD_LEN: usize = 255;

const HEADER_FIELDS: usize = 3;

/// One generic message as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenericMessage {
    Binary { method: String, args: Vec<Vec<u8>> },
    Text { method: String, args: Vec<String> },
}

impl GenericMessage {
    pub fn method(&self) -> &str {
        match self {
            GenericMessage::Binary { method, .. } | GenericMessage::Text { method, .. } => method,
        }
    }

    pub fn field_count(&self) -> usize {
        match self {
            GenericMessage::Binary { args, .. } => args.len(),
            GenericMessage::Text { args, .. } => args.len(),
        }
    }
}

/// A message together with the client that sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub sender: ClientId,
    pub message: GenericMessage,
}

impl Envelope {
    pub fn new(sender: ClientId, message: GenericMessage) -> Self {
        Self { sender, message }
    }
}

/// Request to drop one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRemoval {
    pub entity_id: EntityId,
    pub key: ComponentKey,
}

/// What a recognized message asks the core to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentRequest {
    Update(Component),
    Removal(ComponentRemoval),
}

/// Errors for recognized, well-sized frames that still cannot be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid entity id {value:?} in {method} message: {source}")]
    InvalidEntityId {
        method: &'static str,
        value: String,
        #[source]
        source: ecsync_types::Error,
    },
}

/// Decodes a generic message into a component request.
///
/// Returns `Ok(None)` for messages that are not ours and for recognized
/// messages with too few fields. The latter are logged.
pub fn decode(message: &GenericMessage) -> Result<Option<ComponentRequest>, DecodeError> {
    match message {
        GenericMessage::Binary { method, args } if method.eq_ignore_ascii_case(METHOD_SYNC) => {
            decode_sync(args)
        }
        GenericMessage::Text { method, args } if method.eq_ignore_ascii_case(METHOD_STRING) => {
            decode_string(args)
        }
        GenericMessage::Text { method, args } if method.eq_ignore_ascii_case(METHOD_REMOVE) => {
            decode_remove(args)
        }
        _ => Ok(None),
    }
}

fn decode_sync(args: &[Vec<u8>]) -> Result<Option<ComponentRequest>, DecodeError> {
    let Some((header, fragments)) = split_header(args, HEADER_FIELDS + 1, METHOD_SYNC) else {
        return Ok(None);
    };
    let entity_id = parse_entity_id(METHOD_SYNC, &field_to_string(&header[0]))?;
    Ok(Some(ComponentRequest::Update(Component::binary(
        entity_id,
        field_to_string(&header[1]),
        field_to_string(&header[2]),
        reassemble(fragments),
    ))))
}

fn decode_string(args: &[String]) -> Result<Option<ComponentRequest>, DecodeError> {
    let Some((header, rest)) = split_header(args, HEADER_FIELDS + 1, METHOD_STRING) else {
        return Ok(None);
    };
    let entity_id = parse_entity_id(METHOD_STRING, &header[0])?;
    Ok(Some(ComponentRequest::Update(Component::text(
        entity_id,
        header[1].as_str(),
        header[2].as_str(),
        rest[0].as_str(),
    ))))
}

fn decode_remove(args: &[String]) -> Result<Option<ComponentRequest>, DecodeError> {
    let Some((header, _)) = split_header(args, HEADER_FIELDS, METHOD_REMOVE) else {
        return Ok(None);
    };
    let entity_id = parse_entity_id(METHOD_REMOVE, &header[0])?;
    Ok(Some(ComponentRequest::Removal(ComponentRemoval {
        entity_id,
        key: ComponentKey::new(header[1].as_str(), header[2].as_str()),
    })))
}

/// Splits off the three header fields once the frame has at least `required`.
fn split_header<'a, T>(
    args: &'a [T],
    required: usize,
    method: &'static str,
) -> Option<(&'a [T], &'a [T])> {
    if args.len() < required {
        warn!(
            "Dropping malformed {} message: {} fields, need at least {}",
            method,
            args.len(),
            required
        );
        return None;
    }
    Some(args.split_at(HEADER_FIELDS))
}

fn parse_entity_id(method: &'static str, value: &str) -> Result<EntityId, DecodeError> {
    EntityId::parse(value).map_err(|source| DecodeError::InvalidEntityId {
        method,
        value: value.to_string(),
        source,
    })
}

/// Converts a binary field to text, dropping trailing NUL terminators.
pub fn field_to_string(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim_end_matches('\0').to_string()
}

/// Concatenates payload fragments in order.
pub fn reassemble<T: AsRef<[u8]>>(fragments: &[T]) -> Vec<u8> {
    let total = fragments.iter().map(|f| f.as_ref().len()).sum();
    let mut payload = Vec::with_capacity(total);
    for fragment in fragments {
        payload.extend_from_slice(fragment.as_ref());
    }
    payload
}

/// Encodes a component in the wire shape a client expects.
///
/// Binary components become `ecsync` frames with the payload cut into
/// fragments of at most `max_field_len` bytes (always at least one, possibly
/// empty). Text components become `ecstring` frames.
pub fn encode_update(component: &Component, max_field_len: usize) -> GenericMessage {
    let entity_id = component.entity_id.to_string();
    if !component.is_binary {
        return GenericMessage::Text {
            method: METHOD_STRING.to_string(),
            args: vec![
                entity_id,
                component.component_type.clone(),
                component.component_name.clone(),
                String::from_utf8_lossy(&component.payload).into_owned(),
            ],
        };
    }

    let mut args = vec![
        entity_id.into_bytes(),
        component.component_type.as_bytes().to_vec(),
        component.component_name.as_bytes().to_vec(),
    ];
    if component.payload.is_empty() {
        args.push(Vec::new());
    } else {
        args.extend(
            component
                .payload
                .chunks(max_field_len.max(1))
                .map(<[u8]>::to_vec),
        );
    }
    GenericMessage::Binary {
        method: METHOD_SYNC.to_string(),
        args,
    }
}

/// Encodes a removal as an `ecremove` frame.
pub fn encode_removal(entity_id: &EntityId, key: &ComponentKey) -> GenericMessage {
    GenericMessage::Text {
        method: METHOD_REMOVE.to_string(),
        args: vec![
            entity_id.to_string(),
            key.component_type.clone(),
            key.component_name.clone(),
        ],
    }
}
