//! Task wording rendered from templates.
//!
//! Content and description come from separate templates, so nothing a PR
//! author writes can move text from one field into the other. Rendering is
//! pure; the wording is presentation only.

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, Value, context};
use serde::Serialize;

use crate::core::types::{RemotePr, Review, ReviewKind, ReviewState};

const TEMPLATES: [(&str, &str); 4] = [
    (
        "review_request/content",
        include_str!("templates/review_request_content.md"),
    ),
    (
        "review_request/description",
        include_str!("templates/review_request_description.md"),
    ),
    (
        "review_received/content",
        include_str!("templates/review_received_content.md"),
    ),
    (
        "review_received/description",
        include_str!("templates/review_received_description.md"),
    ),
];

/// Rendered task title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskText {
    pub content: String,
    pub description: String,
}

#[derive(Serialize)]
struct PrContext<'a> {
    url: &'a str,
    number: u64,
    title: &'a str,
    author: &'a str,
    repo: &'a str,
}

impl<'a> From<&'a RemotePr> for PrContext<'a> {
    fn from(pr: &'a RemotePr) -> Self {
        Self {
            url: &pr.url,
            number: pr.number,
            title: &pr.title,
            author: &pr.author,
            repo: &pr.repo,
        }
    }
}

#[derive(Serialize)]
struct ReviewContext<'a> {
    id: u64,
    author: &'a str,
    state: &'a ReviewState,
}

/// Template engine wrapper around minijinja.
pub struct TaskTemplates {
    env: Environment<'static>,
}

impl TaskTemplates {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("load {name} template"))?;
        }
        Ok(Self { env })
    }

    /// Text for a PR the viewer has been asked to review.
    pub fn review_request(&self, pr: &RemotePr) -> Result<TaskText> {
        self.render_task("review_request", context! { pr => PrContext::from(pr) })
    }

    /// Text for the latest review on a PR the viewer authored.
    pub fn review_received(&self, pr: &RemotePr, review: &Review) -> Result<TaskText> {
        let kind = ReviewKind::classify(&review.state);
        self.render_task(
            "review_received",
            context! {
                pr => PrContext::from(pr),
                review => ReviewContext {
                    id: review.id,
                    author: &review.author,
                    state: &review.state,
                },
                kind => kind.as_str(),
            },
        )
    }

    fn render_task(&self, kind: &str, ctx: Value) -> Result<TaskText> {
        let content = self.render(&format!("{kind}/content"), &ctx)?;
        if content.is_empty() {
            return Err(anyhow!("{kind} template rendered empty content"));
        }
        let description = self.render(&format!("{kind}/description"), &ctx)?;
        Ok(TaskText {
            content,
            description,
        })
    }

    fn render(&self, name: &str, ctx: &Value) -> Result<String> {
        let rendered = self
            .env
            .get_template(name)?
            .render(ctx)
            .with_context(|| format!("render {name}"))?;
        Ok(rendered.trim().to_string())
    }
}
