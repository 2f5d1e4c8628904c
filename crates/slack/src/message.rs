/// One fragment of a command reply. Text fields may contain the HTML subset
/// understood by [`crate::markup::MarkupConverter`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub color: Option<String>,
    pub mrkdwn_fields: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attachment {
    pub title: Option<String>,
    pub text: String,
    pub color: Option<String>,
    pub mrkdwn_in: Vec<String>,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_mrkdwn_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mrkdwn_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl Attachment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Fragments from every handler, in handler order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandResult {
    fragments: Vec<Message>,
}

impl CommandResult {
    pub fn new(fragments: Vec<Message>) -> Self {
        Self { fragments }
    }

    pub fn extend(&mut self, fragments: impl IntoIterator<Item = Message>) {
        self.fragments.extend(fragments);
    }

    pub fn fragments(&self) -> &[Message] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }
}
