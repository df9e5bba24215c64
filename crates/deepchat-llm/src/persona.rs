use serde::{Deserialize, Serialize};

/// Canned replies only apply while the conversation has at most this many turns
pub const CANNED_REPLY_MAX_TURNS: usize = 2;

const DEFAULT_SYSTEM_PROMPT: &str = "You are {name}, {description}. Follow these rules:
1. Stay friendly and professional
2. Do not mention DeepSeek or any company name
3. Focus on helping the user solve their problem
4. Keep answers short and clear
5. If the user asks who you are, always answer as {name}";

/// Assistant identity: a system prompt plus locally answered identity questions.
///
/// `{name}` and `{description}` are substituted in the prompt and every reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub description: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_canned_replies")]
    pub canned_replies: Vec<CannedReply>,
}

/// Reply returned without calling the API when `trigger` occurs in the question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CannedReply {
    pub trigger: String,
    pub reply: String,
}

impl CannedReply {
    pub fn new(trigger: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            reply: reply.into(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_canned_replies() -> Vec<CannedReply> {
    vec![
        CannedReply::new("who are you", "I'm {name}, {description}! How can I help?"),
        CannedReply::new("what are you", "I'm {name}, {description}!"),
        CannedReply::new("what's your name", "My name is {name}, {description}."),
        CannedReply::new("who created you", "I'm {name}, {description}."),
        CannedReply::new("what model are you", "I am {name}, {description}."),
        CannedReply::new("你是谁", "我是{name}，{description}！很高兴为你服务！"),
        CannedReply::new("你是什么模型", "我是{name}，{description}"),
        CannedReply::new("你是什么", "我是{name}，{description}！"),
        CannedReply::new("你的名字", "我叫{name}，是{description}"),
        CannedReply::new("谁创造了你", "我是{name}，{description}"),
    ]
}

impl Persona {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: default_system_prompt(),
            canned_replies: default_canned_replies(),
        }
    }

    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    /// Replace the whole reply set, defaults included
    pub fn with_canned_replies(mut self, replies: Vec<CannedReply>) -> Self {
        self.canned_replies = replies;
        self
    }

    /// Merge replies into the current set. A known trigger gets the new reply,
    /// an unknown one is added at the end.
    pub fn extend_canned_replies(mut self, replies: impl IntoIterator<Item = CannedReply>) -> Self {
        for reply in replies {
            match self
                .canned_replies
                .iter_mut()
                .find(|canned| canned.trigger.eq_ignore_ascii_case(&reply.trigger))
            {
                Some(existing) => existing.reply = reply.reply,
                None => self.canned_replies.push(reply),
            }
        }
        self
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{name}", &self.name)
            .replace("{description}", &self.description)
    }

    pub fn render_system_prompt(&self) -> String {
        self.render(&self.system_prompt)
    }

    /// Local answer for an identity question, if one applies.
    ///
    /// `prior_turns` counts the user and assistant messages already exchanged.
    /// First matching trigger wins.
    pub fn canned_reply(&self, question: &str, prior_turns: usize) -> Option<String> {
        if prior_turns > CANNED_REPLY_MAX_TURNS {
            return None;
        }

        let question = question.trim().to_lowercase();
        self.canned_replies
            .iter()
            .find(|canned| question.contains(&canned.trigger.to_lowercase()))
            .map(|canned| self.render(&canned.reply))
    }
}
