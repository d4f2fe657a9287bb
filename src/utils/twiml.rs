//! Minimal TwiML builder for the IVR webhooks.

#[derive(Debug, Clone)]
enum Verb {
    Say { text: String, language: Option<String> },
    Gather(Gather),
    Record(Record),
    Redirect(String),
    Hangup,
}

#[derive(Debug, Clone, Default)]
pub struct Gather {
    action: String,
    num_digits: Option<u32>,
    finish_on_key: Option<String>,
    timeout: Option<u32>,
    input: Option<String>,
    prompts: Vec<(String, Option<String>)>,
}

impl Gather {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn num_digits(mut self, n: u32) -> Self {
        self.num_digits = Some(n);
        self
    }

    pub fn finish_on_key(mut self, key: &str) -> Self {
        self.finish_on_key = Some(key.to_string());
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn input(mut self, input: &str) -> Self {
        self.input = Some(input.to_string());
        self
    }

    pub fn say(mut self, text: impl Into<String>, language: Option<&str>) -> Self {
        self.prompts.push((text.into(), language.map(str::to_string)));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Record {
    action: String,
    max_length: Option<u32>,
    finish_on_key: Option<String>,
    play_beep: bool,
    status_callback: Option<String>,
}

impl Record {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            play_beep: true,
            ..Default::default()
        }
    }

    pub fn max_length(mut self, seconds: u32) -> Self {
        self.max_length = Some(seconds);
        self
    }

    pub fn finish_on_key(mut self, key: &str) -> Self {
        self.finish_on_key = Some(key.to_string());
        self
    }

    pub fn recording_status_callback(mut self, url: impl Into<String>) -> Self {
        self.status_callback = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn say_xml(text: &str, language: Option<&str>) -> String {
    match language {
        Some(lang) => format!("<Say language=\"{}\">{}</Say>", escape_xml(lang), escape_xml(text)),
        None => format!("<Say>{}</Say>", escape_xml(text)),
    }
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>, language: Option<&str>) -> Self {
        self.verbs.push(Verb::Say {
            text: text.into(),
            language: language.map(str::to_string),
        });
        self
    }

    pub fn gather(mut self, gather: Gather) -> Self {
        self.verbs.push(Verb::Gather(gather));
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.verbs.push(Verb::Record(record));
        self
    }

    pub fn redirect(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Redirect(url.into()));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for verb in &self.verbs {
            match verb {
                Verb::Say { text, language } => xml.push_str(&say_xml(text, language.as_deref())),
                Verb::Gather(g) => {
                    xml.push_str(&format!("<Gather action=\"{}\" method=\"POST\"", escape_xml(&g.action)));
                    if let Some(input) = &g.input {
                        xml.push_str(&format!(" input=\"{}\"", escape_xml(input)));
                    }
                    if let Some(n) = g.num_digits {
                        xml.push_str(&format!(" numDigits=\"{}\"", n));
                    }
                    if let Some(key) = &g.finish_on_key {
                        xml.push_str(&format!(" finishOnKey=\"{}\"", escape_xml(key)));
                    }
                    if let Some(t) = g.timeout {
                        xml.push_str(&format!(" timeout=\"{}\"", t));
                    }
                    xml.push('>');
                    for (text, lang) in &g.prompts {
                        xml.push_str(&say_xml(text, lang.as_deref()));
                    }
                    xml.push_str("</Gather>");
                }
                Verb::Record(r) => {
                    xml.push_str(&format!("<Record action=\"{}\" method=\"POST\"", escape_xml(&r.action)));
                    if let Some(n) = r.max_length {
                        xml.push_str(&format!(" maxLength=\"{}\"", n));
                    }
                    if let Some(key) = &r.finish_on_key {
                        xml.push_str(&format!(" finishOnKey=\"{}\"", escape_xml(key)));
                    }
                    xml.push_str(&format!(" playBeep=\"{}\"", r.play_beep));
                    if let Some(cb) = &r.status_callback {
                        xml.push_str(&format!(" recordingStatusCallback=\"{}\"", escape_xml(cb)));
                    }
                    xml.push_str("/>");
                }
                Verb::Redirect(url) => {
                    xml.push_str(&format!("<Redirect method=\"POST\">{}</Redirect>", escape_xml(url)));
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a&b<c>\"d'"), "a&amp;b&lt;c&gt;&quot;d&apos;");
    }

    #[test]
    fn test_gather_and_redirect() {
        let xml = VoiceResponse::new()
            .gather(
                Gather::new("/ivr/handle-action?lang=en-IN&x=1")
                    .num_digits(1)
                    .say("Press 1", Some("en-IN")),
            )
            .redirect("/ivr/welcome")
            .to_xml();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>"));
        assert!(xml.contains("<Gather action=\"/ivr/handle-action?lang=en-IN&amp;x=1\" method=\"POST\" numDigits=\"1\">"));
        assert!(xml.contains("<Say language=\"en-IN\">Press 1</Say></Gather>"));
        assert!(xml.ends_with("<Redirect method=\"POST\">/ivr/welcome</Redirect></Response>"));
    }

    #[test]
    fn test_record_and_hangup() {
        let xml = VoiceResponse::new()
            .record(
                Record::new("/ivr/register/handle-name-recording")
                    .max_length(15)
                    .finish_on_key("*")
                    .recording_status_callback("/ivr/register/handle-name-recording"),
            )
            .hangup()
            .to_xml();

        assert!(xml.contains("maxLength=\"15\""));
        assert!(xml.contains("finishOnKey=\"*\""));
        assert!(xml.contains("playBeep=\"true\""));
        assert!(xml.contains("recordingStatusCallback=\"/ivr/register/handle-name-recording\""));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }
}
