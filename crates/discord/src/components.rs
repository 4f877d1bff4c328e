use chrono::{DateTime, Utc};
use leaveform_core::LeaveRequest;

pub const OPEN_LEAVE_FORM_ID: &str = "open_leave_form";
pub const SUBMIT_LEAVE_FORM_ID: &str = "submit_leave_form";
pub const NAME_FIELD_ID: &str = "name";
pub const DATE_FIELD_ID: &str = "date";
pub const REASON_FIELD_ID: &str = "reason";

pub const ANNOUNCEMENT_COLOUR: u32 = 0x5865F2;
pub const SUBMISSION_SUCCESS_NOTICE: &str = "✅ Leave form submitted!";

const FORM_PROMPT: &str = "Fill in the leave form";
const FORM_BUTTON_LABEL: &str = "📋 Fill leave form";
const MODAL_TITLE: &str = "📝 Leave form";
const ANNOUNCEMENT_TITLE: &str = "📢 New leave request!";
const ANNOUNCEMENT_FOOTER: &str = "Leave form system ✨";

// Embed field values are capped at 1024 characters by the platform.
const REASON_MAX_LENGTH: u16 = 1000;
const SHORT_INPUT_MAX_LENGTH: u16 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonElement {
    pub custom_id: String,
    pub label: String,
}

impl ButtonElement {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { custom_id: custom_id.into(), label: label.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRow {
    pub buttons: Vec<ButtonElement>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextInputStyle {
    Short,
    Paragraph,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextInputElement {
    pub custom_id: String,
    pub label: String,
    pub style: TextInputStyle,
    pub required: bool,
    pub max_length: Option<u16>,
}

impl TextInputElement {
    pub fn short(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(custom_id, label, TextInputStyle::Short)
    }

    pub fn paragraph(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(custom_id, label, TextInputStyle::Paragraph)
    }

    fn new(custom_id: impl Into<String>, label: impl Into<String>, style: TextInputStyle) -> Self {
        Self {
            custom_id: custom_id.into(),
            label: label.into(),
            style,
            required: false,
            max_length: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn max_length(mut self, max_length: u16) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// Modal form. Each input occupies its own action row when rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalTemplate {
    pub custom_id: String,
    pub title: String,
    pub inputs: Vec<TextInputElement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedCard {
    pub title: String,
    pub colour: u32,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    pub content: String,
    pub embeds: Vec<EmbedCard>,
    pub action_rows: Vec<ActionRow>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EphemeralReply {
    pub content: String,
}

impl EphemeralReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

pub struct MessageBuilder {
    content: String,
    embeds: Vec<EmbedCard>,
    action_rows: Vec<ActionRow>,
}

impl MessageBuilder {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), embeds: Vec::new(), action_rows: Vec::new() }
    }

    pub fn embed<F>(mut self, title: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut EmbedBuilder),
    {
        let mut builder = EmbedBuilder::new(title);
        build(&mut builder);
        self.embeds.push(builder.build());
        self
    }

    pub fn actions<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.action_rows.push(ActionRow { buttons: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            content: self.content,
            embeds: self.embeds,
            action_rows: self.action_rows,
        }
    }
}

pub struct EmbedBuilder {
    title: String,
    colour: u32,
    fields: Vec<EmbedField>,
    footer: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl EmbedBuilder {
    fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), colour: 0, fields: Vec::new(), footer: None, timestamp: None }
    }

    pub fn colour(&mut self, colour: u32) -> &mut Self {
        self.colour = colour;
        self
    }

    pub fn field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.push(EmbedField { name: name.into(), value: value.into(), inline: false });
        self
    }

    pub fn footer(&mut self, text: impl Into<String>) -> &mut Self {
        self.footer = Some(text.into());
        self
    }

    pub fn timestamp(&mut self, timestamp: DateTime<Utc>) -> &mut Self {
        self.timestamp = Some(timestamp);
        self
    }

    fn build(self) -> EmbedCard {
        EmbedCard {
            title: self.title,
            colour: self.colour,
            fields: self.fields,
            footer: self.footer,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    buttons: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.buttons.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.buttons
    }
}

pub struct ModalBuilder {
    custom_id: String,
    title: String,
    inputs: Vec<TextInputElement>,
}

impl ModalBuilder {
    pub fn new(custom_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { custom_id: custom_id.into(), title: title.into(), inputs: Vec::new() }
    }

    pub fn input(mut self, input: TextInputElement) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn build(self) -> ModalTemplate {
        ModalTemplate { custom_id: self.custom_id, title: self.title, inputs: self.inputs }
    }
}

pub fn leave_form_prompt() -> MessageTemplate {
    MessageBuilder::new(FORM_PROMPT)
        .actions(|actions| {
            actions.button(ButtonElement::new(OPEN_LEAVE_FORM_ID, FORM_BUTTON_LABEL));
        })
        .build()
}

pub fn leave_form_modal() -> ModalTemplate {
    ModalBuilder::new(SUBMIT_LEAVE_FORM_ID, MODAL_TITLE)
        .input(
            TextInputElement::short(NAME_FIELD_ID, "Name")
                .required()
                .max_length(SHORT_INPUT_MAX_LENGTH),
        )
        .input(
            TextInputElement::short(DATE_FIELD_ID, "Leave date (e.g. 09/08, 09-10/08)")
                .required()
                .max_length(SHORT_INPUT_MAX_LENGTH),
        )
        .input(
            TextInputElement::paragraph(REASON_FIELD_ID, "Reason for leave")
                .required()
                .max_length(REASON_MAX_LENGTH),
        )
        .build()
}

pub fn leave_announcement_card(request: &LeaveRequest) -> MessageTemplate {
    MessageBuilder::new(submitter_line(request))
        .embed(ANNOUNCEMENT_TITLE, |embed| {
            embed
                .colour(ANNOUNCEMENT_COLOUR)
                .field("👤 Name", request.name.as_str())
                .field("📅 Leave date", request.date_range.as_str())
                .field("📝 Reason", request.reason.as_str())
                .footer(ANNOUNCEMENT_FOOTER)
                .timestamp(request.submitted_at);
        })
        .build()
}

pub fn leave_announcement_plain(request: &LeaveRequest) -> MessageTemplate {
    MessageBuilder::new(format!(
        "📢 **{}** is taking leave\n{}\n{}\n{}",
        request.name,
        request.date_range,
        request.reason,
        submitter_line(request)
    ))
    .build()
}

fn submitter_line(request: &LeaveRequest) -> String {
    format!("Submitted by: {}", request.submitter_mention())
}
