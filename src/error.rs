//! Error types for chatform.

use thiserror::Error;

/// Result type alias for chatform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building, rendering, decoding or
/// driving a form.
///
/// Everything except [`Error::Transport`] is handled at the boundary of a
/// single inbound event: the dispatcher converts it into a short transient
/// acknowledgment (see [`Error::user_message`]) and never lets it escape to
/// the transport as an unhandled failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Whole-form validation failed: one or more required fields have no
    /// value at submit time. Field names are in schema order.
    #[error("missing required fields: {}", .missing.join(", "))]
    Validation {
        /// Names of the required fields that are still absent.
        missing: Vec<String>,
    },

    /// A rendered message does not match the expected line/separator
    /// grammar, the text and markup views disagree, or a label has no
    /// matching field. Fatal to that decode attempt.
    #[error("cannot decode message: {0}")]
    Decode(String),

    /// A raw input value failed a field's type cast or validation. The
    /// field keeps its previous value; the rest of the form is untouched.
    #[error("cannot cast '{input}' to {kind} value")]
    FieldCast {
        /// The offending raw input.
        input: String,
        /// The field kind name the cast targeted.
        kind: &'static str,
    },

    /// A callback carried an action code outside the fixed action set.
    #[error("unknown form action '{0}'")]
    UnknownAction(String),

    /// A callback identifier does not follow the
    /// `namespace/form/action/args...` grammar.
    #[error("malformed callback data: {0}")]
    MalformedCallback(String),

    /// A callback referenced a form type that is not registered.
    #[error("unknown form type '{0}'")]
    UnknownForm(String),

    /// A callback referenced a field name absent from the schema.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A callback referenced a custom button id absent from the schema.
    #[error("unknown custom button '{0}'")]
    UnknownButton(String),

    /// An edit was requested for a read-only field.
    #[error("field '{0}' is read-only")]
    ReadOnlyField(String),

    /// A schema or field declaration is invalid (duplicate label or name,
    /// separator inside a label, bad initial value, missing submit
    /// callback, ...). Raised at build time, never during dispatch.
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// The transport collaborator failed. Propagated to the caller; the
    /// dispatcher does not translate transport failures into
    /// acknowledgments.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Short text suitable for a transient user-facing acknowledgment
    /// (e.g. a callback-query answer or a one-off chat message).
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { missing } => {
                format!("Fill all required fields first: {}", missing.join(", "))
            }
            Error::Decode(_) => "Cannot process this form message".into(),
            Error::FieldCast { kind, .. } => {
                format!("Invalid value, cannot cast to {}", kind)
            }
            Error::UnknownAction(_) => "Unknown form action!".into(),
            Error::UnknownField(_) => "Trying to edit unknown field!".into(),
            Error::UnknownButton(_) => "Unknown button!".into(),
            Error::ReadOnlyField(_) => "This field is read-only".into(),
            _ => "Cannot process this request".into(),
        }
    }
}
