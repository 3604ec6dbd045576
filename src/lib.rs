//! chatform - stateless inline forms for chat bots.
//!
//! A form type is declared once as a [`FormSchema`]: an ordered list of
//! typed fields plus submit/cancel callbacks and optional custom buttons.
//! Rendering a [`FormInstance`] produces an editable chat message whose
//! text block *is* the form's entire persistent state; per-field edit
//! buttons carry structured callback identifiers, and state that cannot
//! live in the visible text travels through hidden hyperlink targets. On
//! every button press or captured reply the [`Dispatcher`] reconstructs
//! the instance from the message, applies the action and re-renders. No
//! storage, no sessions.
//!
//! ```
//! use std::rc::Rc;
//! use chatform::{codec, Dispatcher, FieldDef, FormInstance, FormSchema, Value};
//!
//! let schema = Rc::new(
//!     FormSchema::builder("user")
//!         .field(FieldDef::str("name").label("Name").required())
//!         .field(FieldDef::bool("admin").label("Admin"))
//!         .on_submit(|_, form, _| {
//!             println!("submitted: {:?}", form.value("name"));
//!         })
//!         .build()?,
//! );
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register(Rc::clone(&schema))?;
//!
//! let mut form = FormInstance::new(Rc::clone(&schema));
//! form.set_value("name", Value::Str("Alice".into()))?;
//!
//! let body = codec::encode(&form);
//! assert_eq!(body.text, "▸Name: Alice\n▸Admin: ");
//! # Ok::<(), chatform::Error>(())
//! ```
//!
//! Wire a concrete bot API by implementing [`Transport`] and feeding
//! button presses to [`Dispatcher::handle_callback`] and free-text
//! messages to [`Dispatcher::handle_message`].

#![warn(missing_docs)]

pub mod callback;
pub mod codec;
pub mod error;
pub mod field;
pub mod render;
pub mod router;
pub mod schema;
pub mod transport;

pub use error::{Error, Result};
pub use field::{
    BoolGlyphs, EditMode, FieldDef, FieldInstance, FieldKind, FieldOpts, Value, CLEAR_TOKEN,
};
pub use router::Dispatcher;
pub use schema::{CustomButton, FormCallback, FormInstance, FormSchema, SchemaBuilder};
pub use transport::{
    CallbackQuery, ChatId, InlineButton, Keyboard, Message, MessageId, PendingEdit, Transport,
    WireMessage,
};
