//! Transport collaborator interface.
//!
//! The chat transport (message delivery, keyboard rendering, free-text
//! capture) is external to this crate. This module defines the capability
//! trait the dispatcher consumes and the plain data types that cross it.
//! Nothing here talks to a network; bindings for a concrete bot API
//! implement [`Transport`].

use crate::error::Result;

/// Identifies a conversation.
pub type ChatId = i64;

/// Identifies a message within a conversation.
pub type MessageId = i64;

/// One inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    /// Visible button label.
    pub label: String,
    /// Callback identifier delivered back when the button is pressed.
    pub callback_data: String,
}

impl InlineButton {
    /// Create a new inline button.
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// An inline keyboard: rows of buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<InlineButton>>,
}

impl Keyboard {
    /// Create an empty keyboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a button on its own row.
    pub fn add(&mut self, button: InlineButton) {
        self.rows.push(vec![button]);
    }

    /// Append a row of buttons.
    pub fn row(&mut self, buttons: Vec<InlineButton>) {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
    }

    /// Whether the keyboard has no buttons.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The dual-view body of a message.
///
/// Rich-text transports render the same content twice: a plain-text view
/// and a markup view exposing embedded hyperlink targets. The codec emits
/// both and the decoder consumes both; for messages without hidden
/// metadata the two views are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Plain-text view.
    pub text: String,
    /// Markup view; hyperlink targets appear as `<a href="...">` anchors.
    pub markup: String,
}

impl WireMessage {
    /// A body whose markup view equals its plain-text view.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            markup: text.clone(),
            text,
        }
    }
}

/// A delivered chat message, as the dispatcher sees it.
///
/// `text` and `markup` hold the two views of the body as the transport
/// reports them back; transports commonly trim trailing whitespace, which
/// the decoder compensates for on the final line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Conversation the message belongs to.
    pub chat: ChatId,
    /// Message id within the conversation.
    pub id: MessageId,
    /// Plain-text view of the body.
    pub text: String,
    /// Markup view of the body.
    pub markup: String,
}

/// An inbound button-press event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    /// Transport-assigned query id, used to answer the query.
    pub id: String,
    /// The message the pressed button was attached to.
    pub message: Message,
    /// The button's callback identifier.
    pub data: String,
}

/// A pending free-text edit, registered with the transport as a one-shot
/// continuation for the next message in a conversation.
///
/// Plain data, no closures: the dispatcher rebuilds everything it needs
/// from `origin` when the reply arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    /// Form type name the edit belongs to.
    pub form: String,
    /// Name of the field being edited.
    pub field: String,
    /// The rendered form message the edit applies to.
    pub origin: Message,
    /// The "send a new value" prompt message, removed once the edit lands.
    pub prompt: MessageId,
}

/// Capabilities the chat transport must provide.
///
/// The reply registration table is keyed by conversation id only; when two
/// forms in one conversation both await free-text input, the most recent
/// registration wins and the other prompt goes stale. That matches the
/// protocol's documented hazard and is not resolved here.
pub trait Transport {
    /// Send a new message, optionally with an inline keyboard. Returns the
    /// delivered message.
    fn send_message(
        &mut self,
        chat: ChatId,
        body: &WireMessage,
        keyboard: Option<&Keyboard>,
    ) -> Result<Message>;

    /// Replace an existing message's body and keyboard. `None` removes the
    /// keyboard.
    fn edit_message(
        &mut self,
        chat: ChatId,
        id: MessageId,
        body: &WireMessage,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    /// Replace only an existing message's keyboard. `None` removes it.
    fn edit_keyboard(&mut self, chat: ChatId, id: MessageId, keyboard: Option<&Keyboard>)
        -> Result<()>;

    /// Delete a message.
    fn delete_message(&mut self, chat: ChatId, id: MessageId) -> Result<()>;

    /// Answer a callback query with a short transient notification.
    fn answer_callback(&mut self, query_id: &str, text: &str) -> Result<()>;

    /// Register a one-shot continuation for the next free-text message in
    /// `chat`, replacing any previous registration for that conversation.
    fn register_reply(&mut self, chat: ChatId, pending: PendingEdit);

    /// Take (and clear) the continuation registered for `chat`, if any.
    fn take_reply(&mut self, chat: ChatId) -> Option<PendingEdit>;

    /// Drop the continuation registered for `chat`, if any.
    fn clear_reply(&mut self, chat: ChatId);
}
