//! A user-profile form driven from the command line.
//!
//! Runs the whole protocol against a console transport: the "chat" is
//! stdout, button presses and replies are simulated. Shows schema
//! declaration, initial values, a read-only field, a dynamic choice list
//! and the submit flow.

use std::collections::HashMap;
use std::rc::Rc;

use chatform::*;

/// Transport printing every operation and keeping messages in memory.
#[derive(Default)]
struct ConsoleTransport {
    next_id: MessageId,
    messages: HashMap<(ChatId, MessageId), Message>,
    replies: HashMap<ChatId, PendingEdit>,
}

impl Transport for ConsoleTransport {
    fn send_message(
        &mut self,
        chat: ChatId,
        body: &WireMessage,
        keyboard: Option<&Keyboard>,
    ) -> Result<Message> {
        self.next_id += 1;
        let message = Message {
            chat,
            id: self.next_id,
            text: body.text.trim_end().to_string(),
            markup: body.markup.trim_end().to_string(),
        };
        println!("--- send #{} ---\n{}", message.id, message.text);
        print_keyboard(keyboard);
        self.messages.insert((chat, message.id), message.clone());
        Ok(message)
    }

    fn edit_message(
        &mut self,
        chat: ChatId,
        id: MessageId,
        body: &WireMessage,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let message = Message {
            chat,
            id,
            text: body.text.trim_end().to_string(),
            markup: body.markup.trim_end().to_string(),
        };
        println!("--- edit #{} ---\n{}", id, message.text);
        print_keyboard(keyboard);
        self.messages.insert((chat, id), message);
        Ok(())
    }

    fn edit_keyboard(
        &mut self,
        chat: ChatId,
        id: MessageId,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let _ = chat;
        println!("--- keyboard of #{} ---", id);
        print_keyboard(keyboard);
        Ok(())
    }

    fn delete_message(&mut self, chat: ChatId, id: MessageId) -> Result<()> {
        println!("--- delete #{} ---", id);
        self.messages.remove(&(chat, id));
        Ok(())
    }

    fn answer_callback(&mut self, _query_id: &str, text: &str) -> Result<()> {
        println!("*** {} ***", text);
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

fn print_keyboard(keyboard: Option<&Keyboard>) {
    match keyboard {
        Some(kb) => {
            for row in &kb.rows {
                let labels: Vec<&str> = row.iter().map(|b| b.label.as_str()).collect();
                println!("  [{}]", labels.join("] ["));
            }
        }
        None => println!("  (no keyboard)"),
    }
}

const CHAT: ChatId = 1;

fn press(d: &Dispatcher, t: &mut ConsoleTransport, message: &Message, data: String) -> Result<()> {
    println!(">>> press {}", data);
    let message = t
        .messages
        .get(&(message.chat, message.id))
        .cloned()
        .unwrap_or_else(|| message.clone());
    d.handle_callback(
        t,
        &CallbackQuery {
            id: "demo".into(),
            message,
            data,
        },
    )
}

fn say(d: &Dispatcher, t: &mut ConsoleTransport, text: &str) -> Result<()> {
    println!(">>> user says: {}", text);
    t.next_id += 1;
    let message = Message {
        chat: CHAT,
        id: t.next_id,
        text: text.into(),
        markup: text.into(),
    };
    d.handle_message(t, &message)
}

fn main() -> Result<()> {
    env_logger::init();

    let schema = Rc::new(
        FormSchema::builder("user")
            .field(FieldDef::str("name").label("Name").required())
            .field(FieldDef::str("username").label("Username").read_only())
            .field(FieldDef::int("age").label("Age").required())
            .field(FieldDef::bool("admin").label("Admin").initial(Value::Bool(false)))
            .field(FieldDef::choice("sex", vec!["M".into(), "F".into()]).label("Sex"))
            .field(
                FieldDef::dynamic_choice("day")
                    .label("Day of month")
                    .row_width(7)
                    .noneable(),
            )
            .field(FieldDef::link("site").label("Website").noneable())
            .on_submit(|_, form, _| {
                println!(
                    "=== submitted: name={:?} age={:?} admin={:?} ===",
                    form.value("name"),
                    form.value("age"),
                    form.value("admin"),
                );
            })
            .on_cancel(|_, _, _| println!("=== cancelled ==="))
            .build()?,
    );

    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Rc::clone(&schema))?;

    let mut form = FormInstance::new(Rc::clone(&schema));
    form.set_value("username", Value::Str("alice42".into()))?;
    form.field_mut("day")
        .ok_or_else(|| Error::UnknownField("day".into()))?
        .set_choices((1..=31).map(|n| n.to_string()).collect())?;

    let mut transport = ConsoleTransport::default();
    let message = dispatcher.send_form(&mut transport, CHAT, &form)?;

    // Premature submit is refused
    press(&dispatcher, &mut transport, &message, callback::submit("user"))?;

    // Fill the form the way a user would
    press(&dispatcher, &mut transport, &message, callback::edit("user", "name"))?;
    say(&dispatcher, &mut transport, "Alice")?;
    press(&dispatcher, &mut transport, &message, callback::edit("user", "age"))?;
    say(&dispatcher, &mut transport, "30")?;
    press(&dispatcher, &mut transport, &message, callback::edit("user", "admin"))?;
    press(&dispatcher, &mut transport, &message, callback::edit("user", "sex"))?;
    press(
        &dispatcher,
        &mut transport,
        &message,
        callback::field_handler("user", "sex", "1"),
    )?;
    press(
        &dispatcher,
        &mut transport,
        &message,
        callback::field_handler("user", "day", "11"),
    )?;

    press(&dispatcher, &mut transport, &message, callback::submit("user"))?;
    Ok(())
}
