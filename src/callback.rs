//! Callback identifier grammar.
//!
//! Every button minted by this crate carries a structured, `/`-delimited
//! ASCII token: `namespace/form-type-name/action-code[/arg]*`, plus one
//! reserved global cancel token not tied to any form instance. Inbound
//! tokens are parsed back into (form, action, args) for dispatch.

use crate::error::{Error, Result};

/// Namespace prefixing every callback identifier minted by this crate.
pub const NAMESPACE: &str = "__chatform__";

/// Reserved token that cancels a pending free-text prompt. Not tied to a
/// form type; attached to the prompt message's cancel button.
pub const GLOBAL_CANCEL: &str = "__chatform__/cancel";

// ============================================================================
// Actions
// ============================================================================

/// The fixed set of form actions a callback can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Enter a field's edit interaction.
    Edit,
    /// Apply a value chosen inline (choice picker button).
    FieldHandler,
    /// Validate and submit the whole form.
    Submit,
    /// Close the form without submitting.
    Cancel,
    /// Redraw the main form keyboard (escape hatch from a sub-keyboard).
    DisplayMain,
    /// Invoke a schema-declared custom button.
    CustomButton,
}

impl Action {
    /// Wire code for the action.
    pub const fn code(self) -> &'static str {
        match self {
            Action::Edit => "ed",
            Action::FieldHandler => "fh",
            Action::Submit => "ok",
            Action::Cancel => "ca",
            Action::DisplayMain => "dm",
            Action::CustomButton => "cb",
        }
    }

    /// Parse a wire code.
    pub fn from_code(code: &str) -> Option<Action> {
        match code {
            "ed" => Some(Action::Edit),
            "fh" => Some(Action::FieldHandler),
            "ok" => Some(Action::Submit),
            "ca" => Some(Action::Cancel),
            "dm" => Some(Action::DisplayMain),
            "cb" => Some(Action::CustomButton),
            _ => None,
        }
    }
}

// ============================================================================
// Callback data
// ============================================================================

/// A parsed callback identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackData {
    /// Form type name the callback targets.
    pub form: String,
    /// Requested action.
    pub action: Action,
    /// Remaining `/`-separated arguments.
    pub args: Vec<String>,
}

impl CallbackData {
    /// Whether a raw token belongs to this crate's namespace.
    pub fn is_ours(data: &str) -> bool {
        data == NAMESPACE || data.starts_with(&format!("{}/", NAMESPACE))
    }

    /// Parse a raw token. The caller is expected to have checked
    /// [`is_ours`](Self::is_ours) first; the global cancel token is routed
    /// separately and is not a valid form callback.
    pub fn parse(data: &str) -> Result<CallbackData> {
        let mut parts = data.split('/');
        let ns = parts.next().unwrap_or_default();
        if ns != NAMESPACE {
            return Err(Error::MalformedCallback(data.to_string()));
        }
        let form = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::MalformedCallback(data.to_string()))?;
        let code = parts
            .next()
            .ok_or_else(|| Error::MalformedCallback(data.to_string()))?;
        let action =
            Action::from_code(code).ok_or_else(|| Error::UnknownAction(code.to_string()))?;
        Ok(CallbackData {
            form: form.to_string(),
            action,
            args: parts.map(str::to_string).collect(),
        })
    }

    /// Format a token from its parts.
    pub fn format(form: &str, action: Action, args: &[&str]) -> String {
        let mut data = format!("{}/{}/{}", NAMESPACE, form, action.code());
        for arg in args {
            data.push('/');
            data.push_str(arg);
        }
        data
    }
}

/// Token entering a field's edit interaction.
pub fn edit(form: &str, field: &str) -> String {
    CallbackData::format(form, Action::Edit, &[field])
}

/// Token applying an inline-chosen value to a field.
pub fn field_handler(form: &str, field: &str, arg: &str) -> String {
    CallbackData::format(form, Action::FieldHandler, &[field, arg])
}

/// Token submitting the form.
pub fn submit(form: &str) -> String {
    CallbackData::format(form, Action::Submit, &[])
}

/// Token cancelling the form.
pub fn cancel(form: &str) -> String {
    CallbackData::format(form, Action::Cancel, &[])
}

/// Token redrawing the main form keyboard.
pub fn display_main(form: &str) -> String {
    CallbackData::format(form, Action::DisplayMain, &[])
}

/// Token invoking a custom button.
pub fn custom_button(form: &str, button: &str) -> String {
    CallbackData::format(form, Action::CustomButton, &[button])
}
