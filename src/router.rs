//! Action router and edit state machine.
//!
//! The dispatcher owns the registered form schemas and drives every
//! inbound event to completion: it decodes the event's message back into
//! a form instance, routes the parsed callback through a static dispatch
//! table, and re-renders the result. No form state lives between events;
//! the rendered message is the only persistent representation.
//!
//! Error policy: every domain error raised while handling one event is
//! converted into a short transient acknowledgment at this boundary. Only
//! transport failures propagate to the caller.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

use crate::callback::{self, Action, CallbackData};
use crate::codec;
use crate::error::{Error, Result};
use crate::field::{EditMode, Value, CLEAR_TOKEN};
use crate::render;
use crate::schema::{FormInstance, FormSchema};
use crate::transport::{
    CallbackQuery, ChatId, Message, PendingEdit, Transport, WireMessage,
};

/// Prompt shown when a free-text edit begins.
pub const PROMPT_TEXT: &str = "Send a new value";

/// Routes inbound events to the forms registered with it.
#[derive(Debug, Default)]
pub struct Dispatcher {
    forms: HashMap<String, Rc<FormSchema>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a form schema under its type name.
    pub fn register(&mut self, schema: Rc<FormSchema>) -> Result<()> {
        let name = schema.name().to_string();
        if self.forms.contains_key(&name) {
            return Err(Error::InvalidDefinition(format!(
                "form type '{}' already registered",
                name
            )));
        }
        self.forms.insert(name, schema);
        Ok(())
    }

    /// Look up a registered schema by form type name.
    pub fn schema(&self, name: &str) -> Option<&Rc<FormSchema>> {
        self.forms.get(name)
    }

    /// Render a form instance into a fresh message with its main keyboard.
    pub fn send_form(
        &self,
        t: &mut dyn Transport,
        chat: ChatId,
        form: &FormInstance,
    ) -> Result<Message> {
        t.send_message(chat, &codec::encode(form), Some(&render::form_keyboard(form)))
    }

    /// Handle an inbound button press.
    ///
    /// Callbacks outside this crate's namespace are ignored. Domain errors
    /// are answered as transient notifications and never propagate; the
    /// attached message is left unmodified.
    pub fn handle_callback(&self, t: &mut dyn Transport, query: &CallbackQuery) -> Result<()> {
        if !CallbackData::is_ours(&query.data) {
            return Ok(());
        }
        if query.data == callback::GLOBAL_CANCEL {
            // Cancel button on a free-text prompt: drop the prompt and
            // release the pending registration for this conversation
            t.delete_message(query.message.chat, query.message.id)?;
            t.clear_reply(query.message.chat);
            return Ok(());
        }
        match self.dispatch(t, query) {
            Ok(()) => Ok(()),
            Err(e @ Error::Transport(_)) => Err(e),
            Err(e) => {
                warn!("callback '{}' rejected: {}", query.data, e);
                t.answer_callback(&query.id, &e.user_message())
            }
        }
    }

    /// Handle an inbound free-text message.
    ///
    /// Consumes the one-shot continuation registered for the conversation,
    /// if any; otherwise the message is none of this crate's business. A
    /// failed cast is reported and does not re-arm the registration.
    pub fn handle_message(&self, t: &mut dyn Transport, message: &Message) -> Result<()> {
        let Some(pending) = t.take_reply(message.chat) else {
            return Ok(());
        };
        match self.apply_reply(t, &pending, message) {
            Ok(()) => Ok(()),
            Err(e @ Error::Transport(_)) => Err(e),
            Err(e) => {
                warn!(
                    "free-text edit of '{}.{}' rejected: {}",
                    pending.form, pending.field, e
                );
                t.send_message(message.chat, &WireMessage::plain(e.user_message()), None)?;
                Ok(())
            }
        }
    }

    fn dispatch(&self, t: &mut dyn Transport, query: &CallbackQuery) -> Result<()> {
        let cb = CallbackData::parse(&query.data)?;
        let schema = self
            .forms
            .get(&cb.form)
            .ok_or_else(|| Error::UnknownForm(cb.form.clone()))?;
        let mut form = codec::decode(schema, &query.message)?;
        debug!("dispatching {:?} for form '{}'", cb.action, cb.form);

        match cb.action {
            Action::Edit => Self::handle_edit(t, &mut form, query, &cb.args),
            Action::FieldHandler => Self::handle_field_handler(t, &mut form, query, &cb.args),
            Action::Submit => Self::handle_submit(t, schema, &form, query),
            Action::Cancel => Self::handle_cancel(t, schema, &form, query),
            Action::DisplayMain => Self::handle_display_main(t, &form, query),
            Action::CustomButton => Self::handle_custom_button(t, schema, &form, query, &cb.args),
        }
    }

    /// EDIT: enter the field's edit interaction.
    fn handle_edit(
        t: &mut dyn Transport,
        form: &mut FormInstance,
        query: &CallbackQuery,
        args: &[String],
    ) -> Result<()> {
        let field_name = args
            .first()
            .ok_or_else(|| Error::MalformedCallback(query.data.clone()))?;
        let (mode, read_only, current_bool) = {
            let field = form
                .field(field_name)
                .ok_or_else(|| Error::UnknownField(field_name.clone()))?;
            (
                field.edit_mode(),
                field.is_read_only(),
                field.value().and_then(Value::as_bool),
            )
        };
        if read_only {
            return Err(Error::ReadOnlyField(field_name.clone()));
        }

        match mode {
            EditMode::Toggle => {
                // Flip in place; an absent boolean toggles to true
                form.set_value(field_name, Value::Bool(!current_bool.unwrap_or(false)))?;
                t.edit_message(
                    query.message.chat,
                    query.message.id,
                    &codec::encode(form),
                    Some(&render::form_keyboard(form)),
                )
            }
            EditMode::InlineChoice => {
                let kb = render::choice_keyboard(form, field_name)?;
                t.edit_keyboard(query.message.chat, query.message.id, Some(&kb))
            }
            EditMode::FreeText => {
                let prompt = t.send_message(
                    query.message.chat,
                    &WireMessage::plain(PROMPT_TEXT),
                    Some(&render::prompt_keyboard()),
                )?;
                t.register_reply(
                    query.message.chat,
                    PendingEdit {
                        form: form.schema().name().to_string(),
                        field: field_name.clone(),
                        origin: query.message.clone(),
                        prompt: prompt.id,
                    },
                );
                Ok(())
            }
        }
    }

    /// FIELD_HANDLER: apply an inline-chosen value directly.
    fn handle_field_handler(
        t: &mut dyn Transport,
        form: &mut FormInstance,
        query: &CallbackQuery,
        args: &[String],
    ) -> Result<()> {
        let (field_name, arg) = match args {
            [field, arg, ..] => (field, arg),
            _ => return Err(Error::MalformedCallback(query.data.clone())),
        };

        if arg == CLEAR_TOKEN {
            let field = form
                .field_mut(field_name)
                .ok_or_else(|| Error::UnknownField(field_name.clone()))?;
            if field.is_read_only() {
                return Err(Error::ReadOnlyField(field_name.clone()));
            }
            if !field.is_noneable() {
                return Err(Error::FieldCast {
                    input: arg.clone(),
                    kind: "choice",
                });
            }
            field.clear_value();
        } else {
            let choice = {
                let field = form
                    .field(field_name)
                    .ok_or_else(|| Error::UnknownField(field_name.clone()))?;
                if field.is_read_only() {
                    return Err(Error::ReadOnlyField(field_name.clone()));
                }
                let index: usize = arg
                    .parse()
                    .map_err(|_| Error::MalformedCallback(query.data.clone()))?;
                let choices = field.choices().ok_or_else(|| {
                    Error::InvalidDefinition(format!("field '{}' has no choices", field_name))
                })?;
                choices
                    .get(index)
                    .cloned()
                    .ok_or_else(|| Error::FieldCast {
                        input: arg.clone(),
                        kind: "choice",
                    })?
            };
            form.set_value(field_name, Value::Choice(choice))?;
        }

        t.edit_message(
            query.message.chat,
            query.message.id,
            &codec::encode(form),
            Some(&render::form_keyboard(form)),
        )
    }

    /// SUBMIT: validate, strip the keyboard, invoke the submit callback.
    /// On validation failure the message stays unchanged; the error is
    /// surfaced as a transient notification by the caller.
    fn handle_submit(
        t: &mut dyn Transport,
        schema: &Rc<FormSchema>,
        form: &FormInstance,
        query: &CallbackQuery,
    ) -> Result<()> {
        form.validate()?;
        t.edit_keyboard(query.message.chat, query.message.id, None)?;
        schema.run_submit(t, form, query);
        Ok(())
    }

    /// CANCEL: strip the keyboard, release any pending free-text edit for
    /// the conversation, invoke the optional cancel callback.
    fn handle_cancel(
        t: &mut dyn Transport,
        schema: &Rc<FormSchema>,
        form: &FormInstance,
        query: &CallbackQuery,
    ) -> Result<()> {
        t.edit_keyboard(query.message.chat, query.message.id, None)?;
        t.clear_reply(query.message.chat);
        schema.run_cancel(t, form, query);
        Ok(())
    }

    /// DISPLAY_MAIN: redraw the main keyboard, the escape hatch out of a
    /// sub-keyboard.
    fn handle_display_main(
        t: &mut dyn Transport,
        form: &FormInstance,
        query: &CallbackQuery,
    ) -> Result<()> {
        t.edit_keyboard(
            query.message.chat,
            query.message.id,
            Some(&render::form_keyboard(form)),
        )
    }

    /// CUSTOM_BUTTON: invoke the attached callback; close the form
    /// afterwards iff the button says so.
    fn handle_custom_button(
        t: &mut dyn Transport,
        schema: &Rc<FormSchema>,
        form: &FormInstance,
        query: &CallbackQuery,
        args: &[String],
    ) -> Result<()> {
        let id = args
            .first()
            .ok_or_else(|| Error::MalformedCallback(query.data.clone()))?;
        let button = schema
            .button(id)
            .ok_or_else(|| Error::UnknownButton(id.clone()))?;
        button.invoke(t, form, query);
        if button.is_closing() {
            t.edit_keyboard(query.message.chat, query.message.id, None)?;
        }
        Ok(())
    }

    /// Apply a captured free-text reply to its pending edit.
    fn apply_reply(
        &self,
        t: &mut dyn Transport,
        pending: &PendingEdit,
        message: &Message,
    ) -> Result<()> {
        let schema = self
            .forms
            .get(&pending.form)
            .ok_or_else(|| Error::UnknownForm(pending.form.clone()))?;
        let mut form = codec::decode(schema, &pending.origin)?;

        let new_value = {
            let field = form
                .field(&pending.field)
                .ok_or_else(|| Error::UnknownField(pending.field.clone()))?;
            if field.is_read_only() {
                return Err(Error::ReadOnlyField(pending.field.clone()));
            }
            field.parse_input(message.text.trim())?
        };
        match new_value {
            Some(value) => form.set_value(&pending.field, value)?,
            None => form.clear_value(&pending.field)?,
        }

        t.delete_message(message.chat, pending.prompt)?;
        t.edit_message(
            pending.origin.chat,
            pending.origin.id,
            &codec::encode(&form),
            Some(&render::form_keyboard(&form)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDef;
    use crate::schema::CustomButton;
    use crate::transport::{InlineButton, Keyboard, MessageId};
    use std::cell::Cell;

    /// Transport double recording every call. Trims trailing whitespace
    /// off message bodies on delivery, the way real chat transports do.
    #[derive(Default)]
    struct MockTransport {
        next_id: Cell<MessageId>,
        sent: Vec<(ChatId, WireMessage, Option<Keyboard>)>,
        edits: Vec<(ChatId, MessageId, WireMessage, Option<Keyboard>)>,
        keyboard_edits: Vec<(ChatId, MessageId, Option<Keyboard>)>,
        deleted: Vec<(ChatId, MessageId)>,
        answers: Vec<(String, String)>,
        replies: HashMap<ChatId, PendingEdit>,
    }

    impl MockTransport {
        fn deliver(&self, chat: ChatId, id: MessageId, body: &WireMessage) -> Message {
            Message {
                chat,
                id,
                text: body.text.trim_end().to_string(),
                markup: body.markup.trim_end().to_string(),
            }
        }
    }

    impl Transport for MockTransport {
        fn send_message(
            &mut self,
            chat: ChatId,
            body: &WireMessage,
            keyboard: Option<&Keyboard>,
        ) -> Result<Message> {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            self.sent.push((chat, body.clone(), keyboard.cloned()));
            Ok(self.deliver(chat, id, body))
        }

        fn edit_message(
            &mut self,
            chat: ChatId,
            id: MessageId,
            body: &WireMessage,
            keyboard: Option<&Keyboard>,
        ) -> Result<()> {
            self.edits.push((chat, id, body.clone(), keyboard.cloned()));
            Ok(())
        }

        fn edit_keyboard(
            &mut self,
            chat: ChatId,
            id: MessageId,
            keyboard: Option<&Keyboard>,
        ) -> Result<()> {
            self.keyboard_edits.push((chat, id, keyboard.cloned()));
            Ok(())
        }

        fn delete_message(&mut self, chat: ChatId, id: MessageId) -> Result<()> {
            self.deleted.push((chat, id));
            Ok(())
        }

        fn answer_callback(&mut self, query_id: &str, text: &str) -> Result<()> {
            self.answers.push((query_id.to_string(), text.to_string()));
            Ok(())
        }

        fn register_reply(&mut self, chat: ChatId, pending: PendingEdit) {
            self.replies.insert(chat, pending);
        }

        fn take_reply(&mut self, chat: ChatId) -> Option<PendingEdit> {
            self.replies.remove(&chat)
        }

        fn clear_reply(&mut self, chat: ChatId) {
            self.replies.remove(&chat);
        }
    }

    const CHAT: ChatId = 7;

    fn user_schema(submits: Rc<Cell<u32>>, cancels: Rc<Cell<u32>>) -> Rc<FormSchema> {
        Rc::new(
            FormSchema::builder("user")
                .field(FieldDef::str("name").label("Name").required())
                .field(FieldDef::int("age").label("Age"))
                .field(FieldDef::bool("admin").label("Admin"))
                .field(FieldDef::choice("sex", vec!["M".into(), "F".into()]).label("Sex"))
                .field(FieldDef::dynamic_choice("day").label("Day").noneable())
                .on_submit(move |_, _, _| submits.set(submits.get() + 1))
                .on_cancel(move |_, _, _| cancels.set(cancels.get() + 1))
                .build()
                .unwrap(),
        )
    }

    struct Setup {
        dispatcher: Dispatcher,
        transport: MockTransport,
        message: Message,
        submits: Rc<Cell<u32>>,
        cancels: Rc<Cell<u32>>,
    }

    fn setup_with(f: impl FnOnce(&mut FormInstance)) -> Setup {
        let submits = Rc::new(Cell::new(0));
        let cancels = Rc::new(Cell::new(0));
        let schema = user_schema(Rc::clone(&submits), Rc::clone(&cancels));

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Rc::clone(&schema)).unwrap();

        let mut form = FormInstance::new(schema);
        f(&mut form);

        let mut transport = MockTransport::default();
        let message = dispatcher.send_form(&mut transport, CHAT, &form).unwrap();
        Setup {
            dispatcher,
            transport,
            message,
            submits,
            cancels,
        }
    }

    fn setup() -> Setup {
        setup_with(|_| {})
    }

    fn query(message: &Message, data: &str) -> CallbackQuery {
        CallbackQuery {
            id: "q1".into(),
            message: message.clone(),
            data: data.into(),
        }
    }

    #[test]
    fn test_unknown_action_leaves_message_unmodified() {
        let mut s = setup();
        let q = query(&s.message, "__chatform__/user/zz");
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        assert!(s.transport.edits.is_empty());
        assert!(s.transport.keyboard_edits.is_empty());
        assert_eq!(s.transport.answers.len(), 1);
        assert_eq!(s.transport.answers[0].1, "Unknown form action!");
    }

    #[test]
    fn test_foreign_callback_ignored() {
        let mut s = setup();
        let q = query(&s.message, "someone_elses/data");
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        assert!(s.transport.answers.is_empty());
        assert!(s.transport.edits.is_empty());
    }

    #[test]
    fn test_bool_toggle_twice_restores_state() {
        let mut s = setup();

        let q = query(&s.message, &callback::edit("user", "admin"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        let (_, _, body, kb) = s.transport.edits.last().unwrap().clone();
        assert!(body.text.contains("▸Admin: ✅"));
        assert!(kb.unwrap().rows.iter().any(|r| r[0].label == "✅ Admin"));

        // Press the toggle again on the re-rendered message
        let toggled = s.transport.deliver(CHAT, s.message.id, &body);
        let q = query(&toggled, &callback::edit("user", "admin"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        let (_, _, body, _) = s.transport.edits.last().unwrap().clone();
        assert!(body.text.contains("▸Admin: ❌"));

        // And a third press flips back to true
        let toggled = s.transport.deliver(CHAT, s.message.id, &body);
        let q = query(&toggled, &callback::edit("user", "admin"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        let (_, _, body, _) = s.transport.edits.last().unwrap().clone();
        assert!(body.text.contains("▸Admin: ✅"));
    }

    #[test]
    fn test_choice_edit_swaps_keyboard_then_applies() {
        let mut s = setup();

        let q = query(&s.message, &callback::edit("user", "sex"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        let (_, _, kb) = s.transport.keyboard_edits.last().unwrap();
        let kb = kb.as_ref().unwrap();
        assert_eq!(kb.rows[0][0].label, "M");

        let q = query(&s.message, &callback::field_handler("user", "sex", "1"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        let (_, _, body, _) = s.transport.edits.last().unwrap();
        assert!(body.text.contains("▸Sex: F"));
    }

    #[test]
    fn test_choice_index_out_of_range() {
        let mut s = setup();
        let q = query(&s.message, &callback::field_handler("user", "sex", "9"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        assert!(s.transport.edits.is_empty());
        assert_eq!(s.transport.answers.len(), 1);
    }

    #[test]
    fn test_submit_gating_lists_missing_fields() {
        let mut s = setup();
        let q = query(&s.message, &callback::submit("user"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        assert_eq!(s.submits.get(), 0);
        assert!(s.transport.keyboard_edits.is_empty());
        assert_eq!(
            s.transport.answers[0].1,
            "Fill all required fields first: name"
        );
    }

    #[test]
    fn test_submit_success_strips_keyboard_and_calls_back() {
        let mut s = setup_with(|form| {
            form.set_value("name", Value::Str("Alice".into())).unwrap();
        });
        let q = query(&s.message, &callback::submit("user"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        assert_eq!(s.submits.get(), 1);
        let (_, _, kb) = s.transport.keyboard_edits.last().unwrap();
        assert!(kb.is_none());
        assert!(s.transport.answers.is_empty());
    }

    #[test]
    fn test_cancel_strips_keyboard_and_releases_pending_edit() {
        let mut s = setup();

        // Start a free-text edit so a registration exists
        let q = query(&s.message, &callback::edit("user", "name"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        assert!(s.transport.replies.contains_key(&CHAT));

        let q = query(&s.message, &callback::cancel("user"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        assert_eq!(s.cancels.get(), 1);
        assert!(!s.transport.replies.contains_key(&CHAT));
        let (_, _, kb) = s.transport.keyboard_edits.last().unwrap();
        assert!(kb.is_none());
    }

    #[test]
    fn test_free_text_edit_happy_path() {
        let mut s = setup();

        let q = query(&s.message, &callback::edit("user", "age"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        // Prompt sent with the global-cancel keyboard
        let (_, prompt_body, prompt_kb) = s.transport.sent.last().unwrap();
        assert_eq!(prompt_body.text, PROMPT_TEXT);
        assert_eq!(
            prompt_kb.as_ref().unwrap().rows[0][0].callback_data,
            callback::GLOBAL_CANCEL
        );
        let pending = s.transport.replies.get(&CHAT).unwrap().clone();
        assert_eq!(pending.field, "age");

        // The next free-text message lands in the field
        let reply = Message {
            chat: CHAT,
            id: 500,
            text: "33".into(),
            markup: "33".into(),
        };
        s.dispatcher.handle_message(&mut s.transport, &reply).unwrap();

        assert!(s.transport.deleted.contains(&(CHAT, pending.prompt)));
        let (_, id, body, _) = s.transport.edits.last().unwrap();
        assert_eq!(*id, s.message.id);
        assert!(body.text.contains("▸Age: 33"));
        assert!(!s.transport.replies.contains_key(&CHAT));
    }

    #[test]
    fn test_free_text_cast_failure_keeps_form_untouched() {
        let mut s = setup();

        let q = query(&s.message, &callback::edit("user", "age"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        let reply = Message {
            chat: CHAT,
            id: 500,
            text: "not a number".into(),
            markup: "not a number".into(),
        };
        s.dispatcher.handle_message(&mut s.transport, &reply).unwrap();

        // Error reported, origin untouched, registration consumed
        let (_, body, _) = s.transport.sent.last().unwrap();
        assert_eq!(body.text, "Invalid value, cannot cast to integer");
        assert!(s.transport.edits.is_empty());
        assert!(!s.transport.replies.contains_key(&CHAT));
    }

    #[test]
    fn test_free_text_without_registration_is_ignored() {
        let mut s = setup();
        let reply = Message {
            chat: CHAT,
            id: 500,
            text: "hello".into(),
            markup: "hello".into(),
        };
        s.dispatcher.handle_message(&mut s.transport, &reply).unwrap();
        assert!(s.transport.sent.len() == 1); // only the original form
        assert!(s.transport.edits.is_empty());
    }

    #[test]
    fn test_global_cancel_deletes_prompt_and_clears_registration() {
        let mut s = setup();

        let q = query(&s.message, &callback::edit("user", "name"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();
        let pending = s.transport.replies.get(&CHAT).unwrap().clone();

        let prompt_message = Message {
            chat: CHAT,
            id: pending.prompt,
            text: PROMPT_TEXT.into(),
            markup: PROMPT_TEXT.into(),
        };
        let q = query(&prompt_message, callback::GLOBAL_CANCEL);
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        assert!(s.transport.deleted.contains(&(CHAT, pending.prompt)));
        assert!(!s.transport.replies.contains_key(&CHAT));
    }

    #[test]
    fn test_edit_read_only_field_rejected() {
        let submits = Rc::new(Cell::new(0));
        let schema = Rc::new(
            FormSchema::builder("locked")
                .field(FieldDef::str("id").label("Id").read_only())
                .on_submit({
                    let submits = Rc::clone(&submits);
                    move |_, _, _| submits.set(submits.get() + 1)
                })
                .build()
                .unwrap(),
        );
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Rc::clone(&schema)).unwrap();
        let mut transport = MockTransport::default();
        let message = dispatcher
            .send_form(&mut transport, CHAT, &FormInstance::new(schema))
            .unwrap();

        let q = query(&message, &callback::edit("locked", "id"));
        dispatcher.handle_callback(&mut transport, &q).unwrap();
        assert_eq!(transport.answers[0].1, "This field is read-only");
        assert!(transport.edits.is_empty());
    }

    #[test]
    fn test_noneable_choice_clear_button() {
        let mut s = setup_with(|form| {
            form.field_mut("day")
                .unwrap()
                .set_choices(vec!["1".into(), "2".into()])
                .unwrap();
            form.set_value("day", Value::Choice("2".into())).unwrap();
        });

        let q = query(&s.message, &callback::field_handler("user", "day", CLEAR_TOKEN));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        let (_, _, body, _) = s.transport.edits.last().unwrap();
        assert!(body.text.contains("▸Day:"));
        assert!(!body.text.contains("▸Day: 2"));
    }

    #[test]
    fn test_display_main_restores_form_keyboard() {
        let mut s = setup();
        let q = query(&s.message, &callback::display_main("user"));
        s.dispatcher.handle_callback(&mut s.transport, &q).unwrap();

        let (_, _, kb) = s.transport.keyboard_edits.last().unwrap();
        let kb = kb.as_ref().unwrap();
        assert!(kb.rows.iter().any(|r| r[0].label.ends_with("Name")));
        assert!(kb
            .rows
            .last()
            .unwrap()
            .iter()
            .any(|b: &InlineButton| b.label == render::OK_LABEL));
    }

    #[test]
    fn test_custom_button_closing_and_not() {
        let pressed = Rc::new(Cell::new(0));
        let schema = Rc::new(
            FormSchema::builder("btns")
                .field(FieldDef::str("a").label("A"))
                .button(CustomButton::new("ping", "Ping", {
                    let pressed = Rc::clone(&pressed);
                    move |_, _, _| pressed.set(pressed.get() + 1)
                }))
                .button(
                    CustomButton::new("done", "Done", |_, _, _| {}).closes_form(),
                )
                .on_submit(|_, _, _| {})
                .build()
                .unwrap(),
        );
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Rc::clone(&schema)).unwrap();
        let mut transport = MockTransport::default();
        let message = dispatcher
            .send_form(&mut transport, CHAT, &FormInstance::new(schema))
            .unwrap();

        let q = query(&message, &callback::custom_button("btns", "ping"));
        dispatcher.handle_callback(&mut transport, &q).unwrap();
        assert_eq!(pressed.get(), 1);
        assert!(transport.keyboard_edits.is_empty());

        let q = query(&message, &callback::custom_button("btns", "done"));
        dispatcher.handle_callback(&mut transport, &q).unwrap();
        let (_, _, kb) = transport.keyboard_edits.last().unwrap();
        assert!(kb.is_none());

        let q = query(&message, &callback::custom_button("btns", "ghost"));
        dispatcher.handle_callback(&mut transport, &q).unwrap();
        assert_eq!(transport.answers.last().unwrap().1, "Unknown button!");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let submits = Rc::new(Cell::new(0));
        let cancels = Rc::new(Cell::new(0));
        let schema = user_schema(submits, cancels);
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Rc::clone(&schema)).unwrap();
        assert!(dispatcher.register(schema).is_err());
    }
}
