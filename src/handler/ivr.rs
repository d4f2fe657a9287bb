use std::sync::Arc;

use axum::{
    extract::Query,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::userdb::{NewUser, UserExt},
    models::usermodel::{join_skills, UserRole},
    service::speech::{extract_worker_details, AudioEncoding},
    utils::{
        phone::normalize_ivr_digits,
        twiml::{Gather, Record, VoiceResponse},
    },
    AppState,
};

const NAME_RECORDING_SECONDS: u32 = 15;
const SKILLS_RECORDING_SECONDS: u32 = 30;
const PHONE_GATHER_TIMEOUT: u32 = 10;

pub fn ivr_handler() -> Router {
    Router::new()
        .route("/welcome", get(welcome).post(welcome))
        .route("/handle-language", post(handle_language))
        .route("/handle-action", post(handle_action))
        .route("/register/handle-phone", post(handle_phone))
        .route("/register/handle-name-recording", post(handle_name_recording))
        .route("/register/handle-skills-recording", post(handle_skills_recording))
}

/// Call language, carried between steps as `lang=en-IN|hi-IN`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallLanguage {
    English,
    Hindi,
}

impl CallLanguage {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("hi-IN") => CallLanguage::Hindi,
            _ => CallLanguage::English,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            CallLanguage::English => "en-IN",
            CallLanguage::Hindi => "hi-IN",
        }
    }

    /// Stored `users.language` value.
    pub fn short(self) -> &'static str {
        match self {
            CallLanguage::English => "en",
            CallLanguage::Hindi => "hi",
        }
    }

    fn menu_digit(self) -> &'static str {
        match self {
            CallLanguage::English => "1",
            CallLanguage::Hindi => "2",
        }
    }

    fn pick<'a>(self, en: &'a str, hi: &'a str) -> &'a str {
        match self {
            CallLanguage::English => en,
            CallLanguage::Hindi => hi,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct IvrQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Digits", skip_serializing_if = "Option::is_none")]
    pub digits: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TwilioForm {
    #[serde(rename = "Digits")]
    pub digits: Option<String>,
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingDuration")]
    pub recording_duration: Option<String>,
}

impl TwilioForm {
    /// A usable recording needs a URL and at least one second of audio.
    fn recording(&self) -> Option<&str> {
        let duration: u32 = self.recording_duration.as_deref()?.trim().parse().ok()?;
        match self.recording_url.as_deref() {
            Some(url) if !url.is_empty() && duration >= 1 => Some(url),
            _ => None,
        }
    }
}

fn step_url(path: &str, query: &IvrQuery) -> String {
    match serde_urlencoded::to_string(query) {
        Ok(qs) if !qs.is_empty() => format!("/ivr{}?{}", path, qs),
        _ => format!("/ivr{}", path),
    }
}

fn lang_query(lang: CallLanguage) -> IvrQuery {
    IvrQuery {
        lang: Some(lang.code().to_string()),
        ..Default::default()
    }
}

fn action_retry_url(lang: CallLanguage) -> String {
    step_url(
        "/handle-action",
        &IvrQuery {
            digits: Some("1".to_string()),
            ..lang_query(lang)
        },
    )
}

fn twiml(response: VoiceResponse) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], response.to_xml()).into_response()
}

pub fn welcome_response() -> VoiceResponse {
    let gather = Gather::new("/ivr/handle-language")
        .num_digits(1)
        .say("Welcome to Shram Bandhu.", Some("en-IN"))
        .say("Shram Bandhu mein aapka swagat hai.", Some("hi-IN"))
        .say("For English, press 1. Hindi ke liye, 2 dabayein.", Some("en-IN"));

    VoiceResponse::new().gather(gather).redirect("/ivr/welcome")
}

pub fn language_response(digits: Option<&str>) -> VoiceResponse {
    let lang = match digits {
        Some("1") => CallLanguage::English,
        Some("2") => CallLanguage::Hindi,
        _ => {
            return VoiceResponse::new()
                .say(
                    "Sorry, invalid selection. Kripya sahi vikalp chunein.",
                    Some("hi-IN"),
                )
                .redirect("/ivr/welcome")
        }
    };

    let prompt = lang.pick(
        "You selected English. Press 1 to Register as a new worker. Press 2 for other options.",
        "Aapne Hindi chuna hai. Naye worker ke roop mein register karne ke liye 1 dabayein. Anya vikalpon ke liye 2 dabayein.",
    );
    let gather = Gather::new(step_url("/handle-action", &lang_query(lang)))
        .num_digits(1)
        .say(prompt, Some(lang.code()));

    VoiceResponse::new().gather(gather).redirect(step_url(
        "/handle-language",
        &IvrQuery {
            digits: Some(lang.menu_digit().to_string()),
            ..Default::default()
        },
    ))
}

pub fn action_response(lang: CallLanguage, digits: Option<&str>) -> VoiceResponse {
    match digits {
        Some("1") => {
            let gather = Gather::new(step_url("/register/handle-phone", &lang_query(lang)))
                .input("dtmf")
                .finish_on_key("#")
                .timeout(PHONE_GATHER_TIMEOUT)
                .say(
                    lang.pick(
                        "Please enter your 10-digit mobile number, followed by the hash key.",
                        "Kripya apna 10 ank ka mobile number darj karein, aur fir hash key dabayein.",
                    ),
                    Some(lang.code()),
                );
            VoiceResponse::new().gather(gather).redirect(action_retry_url(lang))
        }
        Some("2") => VoiceResponse::new()
            .say(
                lang.pick(
                    "Other options are currently not available via phone. Please visit our website. Goodbye.",
                    "Anya vikalp abhi phone par uplabdh nahin hain. Kripya hamari website par jayein. Dhanyavaad.",
                ),
                Some(lang.code()),
            )
            .hangup(),
        _ => VoiceResponse::new()
            .say(
                lang.pick("Sorry, invalid selection.", "Maaf kijiye, galat vikalp."),
                Some(lang.code()),
            )
            .redirect(step_url(
                "/handle-language",
                &IvrQuery {
                    digits: Some(lang.menu_digit().to_string()),
                    ..Default::default()
                },
            )),
    }
}

pub fn invalid_phone_response(lang: CallLanguage) -> VoiceResponse {
    VoiceResponse::new()
        .say(
            lang.pick(
                "Invalid phone number entered. Please enter a 10-digit number.",
                "Galat phone number darj kiya gaya hai. Kripya 10 ank ka number darj karein.",
            ),
            Some(lang.code()),
        )
        .redirect(action_retry_url(lang))
}

pub fn already_registered_response(lang: CallLanguage, digits: &str) -> VoiceResponse {
    let text = match lang {
        CallLanguage::English => format!(
            "This number, {}, is already registered and verified. Please use the login option. Goodbye.",
            digits
        ),
        CallLanguage::Hindi => format!(
            "Yeh number, {}, pehle se register aur verify ho chuka hai. Kripya login vikalp ka upyog karein. Dhanyavaad.",
            digits
        ),
    };
    VoiceResponse::new().say(text, Some(lang.code())).hangup()
}

pub fn record_name_response(lang: CallLanguage, phone: &str) -> VoiceResponse {
    let next = step_url(
        "/register/handle-name-recording",
        &IvrQuery {
            phone: Some(phone.to_string()),
            ..lang_query(lang)
        },
    );

    VoiceResponse::new()
        .say(
            lang.pick(
                "Thank you. Now, please say your full name after the beep, then press any key.",
                "Dhanyavaad. Ab, kripya beep ke baad apna poora naam kahein, fir koi bhi key dabayein.",
            ),
            Some(lang.code()),
        )
        .record(
            Record::new(next.clone())
                .max_length(NAME_RECORDING_SECONDS)
                .finish_on_key("*")
                .recording_status_callback(next),
        )
}

pub fn name_retry_response(lang: CallLanguage, failed: bool) -> VoiceResponse {
    let text = if failed {
        lang.pick(
            "Sorry, there was an error processing your name.",
            "Maaf kijiye, aapka naam process karne mein error hua.",
        )
    } else {
        lang.pick(
            "Sorry, I didn't catch your name. Please try again.",
            "Maaf kijiye, mujhe aapka naam samajh nahi aaya. Kripya fir se koshish karein.",
        )
    };
    VoiceResponse::new()
        .say(text, Some(lang.code()))
        .redirect(action_retry_url(lang))
}

pub fn record_skills_response(lang: CallLanguage, phone: &str, name: &str) -> VoiceResponse {
    let next = step_url(
        "/register/handle-skills-recording",
        &IvrQuery {
            phone: Some(phone.to_string()),
            name: Some(name.to_string()),
            ..lang_query(lang)
        },
    );

    let text = match lang {
        CallLanguage::English => format!(
            "Thank you, {}. Now, please tell me your skills after the beep, like 'masonry' or 'plumbing and electrical work'. Press any key when finished.",
            name
        ),
        CallLanguage::Hindi => format!(
            "Dhanyavaad, {}. Ab, kripya beep ke baad apne skills batayein, jaise 'Mistri ka kaam' ya 'Plumbing aur Bijli ka kaam'. Bolne ke baad koi bhi key dabayein.",
            name
        ),
    };

    VoiceResponse::new().say(text, Some(lang.code())).record(
        Record::new(next.clone())
            .max_length(SKILLS_RECORDING_SECONDS)
            .finish_on_key("*")
            .recording_status_callback(next),
    )
}

/// Terminal outcomes of the skills step. Each one hangs up.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    NoRecording,
    TranscriptionFailed,
    Registered { name: String, skills: Vec<String> },
    AlreadyRegistered,
    DatabaseError,
}

pub fn registration_response(lang: CallLanguage, outcome: &RegistrationOutcome) -> VoiceResponse {
    let text = match outcome {
        RegistrationOutcome::NoRecording => lang
            .pick(
                "Sorry, I didn't catch your skills. Registration cannot be completed.",
                "Maaf kijiye, mujhe aapke skills samajh nahi aaye. Registration poora nahi ho saka.",
            )
            .to_string(),
        RegistrationOutcome::TranscriptionFailed => lang
            .pick(
                "Sorry, there was an error processing your skills. Registration cannot be completed.",
                "Maaf kijiye, aapke skills process karne mein error hua. Registration poora nahi ho saka.",
            )
            .to_string(),
        RegistrationOutcome::Registered { name, skills } => {
            let listed = if skills.is_empty() {
                lang.pick("Not specified", "Nahi bataya gaya").to_string()
            } else {
                skills.join(", ")
            };
            match lang {
                CallLanguage::English => format!(
                    "Thank you, {}. You have been successfully registered as a worker with skills: {}. You can now use our website or app. Goodbye.",
                    name, listed
                ),
                CallLanguage::Hindi => format!(
                    "Dhanyavaad, {}. Aap safaltapoorvak ek worker ke roop mein register ho gaye hain. Aapke skills hain: {}. Ab aap hamari website ya app ka upyog kar sakte hain. Dhanyavaad.",
                    name, listed
                ),
            }
        }
        RegistrationOutcome::AlreadyRegistered => lang
            .pick(
                "It seems you are already registered. Please use login options. Goodbye.",
                "Lagta hai aap pehle se hi register hain. Kripya login vikalpon ka upyog karein. Dhanyavaad.",
            )
            .to_string(),
        RegistrationOutcome::DatabaseError => lang
            .pick(
                "Sorry, a database error occurred during final registration. Please try again later.",
                "Maaf kijiye, antim registration ke dauraan database mein error hua. Kripya baad mein fir se koshish karein.",
            )
            .to_string(),
    };

    VoiceResponse::new().say(text, Some(lang.code())).hangup()
}

pub async fn welcome() -> impl IntoResponse {
    twiml(welcome_response())
}

pub async fn handle_language(
    Query(query): Query<IvrQuery>,
    Form(form): Form<TwilioForm>,
) -> impl IntoResponse {
    let digits = form.digits.or(query.digits);
    twiml(language_response(digits.as_deref().map(str::trim)))
}

pub async fn handle_action(
    Query(query): Query<IvrQuery>,
    Form(form): Form<TwilioForm>,
) -> impl IntoResponse {
    let lang = CallLanguage::from_code(query.lang.as_deref());
    let digits = form.digits.or(query.digits);
    twiml(action_response(lang, digits.as_deref().map(str::trim)))
}

pub async fn handle_phone(
    Query(query): Query<IvrQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
    Form(form): Form<TwilioForm>,
) -> impl IntoResponse {
    let lang = CallLanguage::from_code(query.lang.as_deref());
    let entered = form.digits.unwrap_or_default();

    let Some(phone) = normalize_ivr_digits(&entered) else {
        return twiml(invalid_phone_response(lang));
    };

    match app_state
        .db_client
        .get_user(None, None, Some(&phone), None)
        .await
    {
        Ok(Some(user)) if user.is_phone_verified => {
            twiml(already_registered_response(lang, entered.trim()))
        }
        Ok(_) => twiml(record_name_response(lang, &phone)),
        Err(e) => {
            tracing::error!("IVR phone lookup for {} failed: {}", phone, e);
            twiml(registration_response(lang, &RegistrationOutcome::DatabaseError))
        }
    }
}

async fn transcribe_recording(
    app_state: &AppState,
    recording_url: &str,
    lang: CallLanguage,
) -> Result<String, String> {
    let audio = app_state
        .twilio
        .download_recording(recording_url)
        .await
        .map_err(|e| e.to_string())?;

    app_state
        .speech
        .transcribe(&audio, lang.code(), AudioEncoding::Wav)
        .await
        .map_err(|e| e.to_string())
}

pub async fn handle_name_recording(
    Query(query): Query<IvrQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
    Form(form): Form<TwilioForm>,
) -> impl IntoResponse {
    let lang = CallLanguage::from_code(query.lang.as_deref());
    let phone = query.phone.unwrap_or_default();

    let Some(recording_url) = form.recording() else {
        return twiml(name_retry_response(lang, false));
    };

    let transcript = match transcribe_recording(&app_state, recording_url, lang).await {
        Ok(transcript) => transcript,
        Err(e) => {
            tracing::error!("IVR name recording for {} failed: {}", phone, e);
            return twiml(name_retry_response(lang, true));
        }
    };
    tracing::info!("IVR name transcription for {}: {}", phone, transcript);

    let extracted = extract_worker_details(&transcript).name;
    let name = if extracted.is_empty() {
        tracing::warn!("No name marker in IVR transcript for {}", phone);
        transcript.trim().to_string()
    } else {
        extracted
    };

    twiml(record_skills_response(lang, &phone, &name))
}

pub async fn handle_skills_recording(
    Query(query): Query<IvrQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
    Form(form): Form<TwilioForm>,
) -> impl IntoResponse {
    let lang = CallLanguage::from_code(query.lang.as_deref());
    let outcome = register_caller(&app_state, lang, query, &form).await;
    twiml(registration_response(lang, &outcome))
}

async fn register_caller(
    app_state: &AppState,
    lang: CallLanguage,
    query: IvrQuery,
    form: &TwilioForm,
) -> RegistrationOutcome {
    let Some(recording_url) = form.recording() else {
        return RegistrationOutcome::NoRecording;
    };
    let (Some(phone), name) = (query.phone, query.name.unwrap_or_default()) else {
        return RegistrationOutcome::DatabaseError;
    };

    let skills = match transcribe_recording(app_state, recording_url, lang).await {
        Ok(transcript) => {
            tracing::info!("IVR skills transcription for {}: {}", phone, transcript);
            extract_worker_details(&transcript).skills
        }
        Err(e) => {
            tracing::error!("IVR skills recording for {} failed: {}", phone, e);
            return RegistrationOutcome::TranscriptionFailed;
        }
    };

    match app_state.db_client.get_user(None, None, Some(&phone), None).await {
        Ok(Some(_)) => {
            tracing::warn!("User {} already existed at the final IVR step", phone);
            return RegistrationOutcome::AlreadyRegistered;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("IVR user lookup for {} failed: {}", phone, e);
            return RegistrationOutcome::DatabaseError;
        }
    }

    let new_user = NewUser {
        name: Some(name.clone()).filter(|n| !n.is_empty()),
        phone: Some(phone.clone()),
        skills: (!skills.is_empty()).then(|| join_skills(&skills)),
        language: Some(lang.short().to_string()),
        is_phone_verified: true,
        ..Default::default()
    };

    match app_state.db_client.save_user(UserRole::Worker, new_user).await {
        Ok(user) => {
            tracing::info!("IVR registration complete for user {}", user.id);
            RegistrationOutcome::Registered { name, skills }
        }
        Err(e) => {
            tracing::error!("Saving IVR user {} failed: {}", phone, e);
            RegistrationOutcome::DatabaseError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_gathers_language_digit() {
        let xml = welcome_response().to_xml();
        assert!(xml.contains("<Gather action=\"/ivr/handle-language\" method=\"POST\" numDigits=\"1\">"));
        assert!(xml.contains("<Say language=\"hi-IN\">Shram Bandhu mein aapka swagat hai.</Say>"));
        assert!(xml.ends_with("<Redirect method=\"POST\">/ivr/welcome</Redirect></Response>"));
    }

    #[test]
    fn test_language_selection() {
        let xml = language_response(Some("2")).to_xml();
        assert!(xml.contains("action=\"/ivr/handle-action?lang=hi-IN\""));
        assert!(xml.contains("Aapne Hindi chuna hai."));
        assert!(xml.contains("/ivr/handle-language?Digits=2"));

        let invalid = language_response(Some("7")).to_xml();
        assert!(invalid.contains("Sorry, invalid selection."));
        assert!(invalid.contains("<Redirect method=\"POST\">/ivr/welcome</Redirect>"));
        assert!(!invalid.contains("<Gather"));
    }

    #[test]
    fn test_action_register_asks_for_phone() {
        let xml = action_response(CallLanguage::English, Some("1")).to_xml();
        assert!(xml.contains("action=\"/ivr/register/handle-phone?lang=en-IN\""));
        assert!(xml.contains("input=\"dtmf\""));
        assert!(xml.contains("finishOnKey=\"#\""));
        assert!(xml.contains("timeout=\"10\""));
        assert!(xml.contains("/ivr/handle-action?lang=en-IN&amp;Digits=1"));

        let other = action_response(CallLanguage::Hindi, Some("2")).to_xml();
        assert!(other.ends_with("<Hangup/></Response>"));

        let invalid = action_response(CallLanguage::Hindi, Some("9")).to_xml();
        assert!(invalid.contains("Maaf kijiye, galat vikalp."));
        assert!(invalid.contains("/ivr/handle-language?Digits=2"));
    }

    #[test]
    fn test_name_recording_prompt_carries_phone() {
        let xml = record_name_response(CallLanguage::English, "+919876543210").to_xml();
        let url = "/ivr/register/handle-name-recording?lang=en-IN&amp;phone=%2B919876543210";
        assert!(xml.contains(&format!("<Record action=\"{}\"", url)));
        assert!(xml.contains(&format!("recordingStatusCallback=\"{}\"", url)));
        assert!(xml.contains("maxLength=\"15\""));
        assert!(xml.contains("finishOnKey=\"*\""));
        assert!(xml.contains("playBeep=\"true\""));
    }

    #[test]
    fn test_skills_prompt_encodes_name() {
        let xml = record_skills_response(CallLanguage::English, "+919876543210", "Ramesh Kumar").to_xml();
        assert!(xml.contains("Thank you, Ramesh Kumar."));
        assert!(xml.contains("name=Ramesh+Kumar"));
        assert!(xml.contains("maxLength=\"30\""));
    }

    #[test]
    fn test_registration_outcomes_hang_up() {
        let registered = registration_response(
            CallLanguage::English,
            &RegistrationOutcome::Registered {
                name: "Ramesh".into(),
                skills: vec!["masonry".into(), "plumbing".into()],
            },
        )
        .to_xml();
        assert!(registered.contains("with skills: masonry, plumbing."));
        assert!(registered.ends_with("<Hangup/></Response>"));

        let unnamed = registration_response(
            CallLanguage::Hindi,
            &RegistrationOutcome::Registered {
                name: "Ramesh".into(),
                skills: vec![],
            },
        )
        .to_xml();
        assert!(unnamed.contains("Nahi bataya gaya"));

        for outcome in [
            RegistrationOutcome::NoRecording,
            RegistrationOutcome::TranscriptionFailed,
            RegistrationOutcome::AlreadyRegistered,
            RegistrationOutcome::DatabaseError,
        ] {
            let xml = registration_response(CallLanguage::English, &outcome).to_xml();
            assert!(xml.ends_with("<Hangup/></Response>"));
        }
    }

    #[test]
    fn test_recording_requires_duration() {
        let form = TwilioForm {
            recording_url: Some("https://api.twilio.com/rec/RE1".into()),
            recording_duration: Some("0".into()),
            ..Default::default()
        };
        assert!(form.recording().is_none());

        let form = TwilioForm {
            recording_url: Some("https://api.twilio.com/rec/RE1".into()),
            recording_duration: Some("4".into()),
            ..Default::default()
        };
        assert_eq!(form.recording(), Some("https://api.twilio.com/rec/RE1"));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(CallLanguage::from_code(Some("hi-IN")).short(), "hi");
        assert_eq!(CallLanguage::from_code(None), CallLanguage::English);
        assert_eq!(CallLanguage::from_code(Some("fr-FR")).code(), "en-IN");
    }
}
