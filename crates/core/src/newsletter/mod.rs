//! Newsletter rendering.
//!
//! A [`NewsletterTemplate`] is an ordered list of sections. Each section body
//! is either static text or a named slot filled at render time; an empty or
//! missing slot renders its fallback sentence.

use std::collections::BTreeMap;

pub const SLOT_COMPANY_INSIGHTS: &str = "company_insights";
pub const SLOT_MARKET_TRENDS: &str = "market_trends";

pub const NO_COMPANY_NEWS: &str = "No company news available.";
pub const NO_MARKET_TRENDS: &str = "No market trends available.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Static(Vec<String>),
    Slot { name: String, fallback: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub body: SectionBody,
}

impl Section {
    pub fn slot(heading: &str, name: &str, fallback: &str) -> Self {
        Self {
            heading: heading.to_string(),
            body: SectionBody::Slot {
                name: name.to_string(),
                fallback: fallback.to_string(),
            },
        }
    }

    pub fn fixed(heading: &str, lines: &[&str]) -> Self {
        Self {
            heading: heading.to_string(),
            body: SectionBody::Static(lines.iter().map(|l| l.to_string()).collect()),
        }
    }
}

/// Values for named slots; each slot's strings are joined with single spaces.
#[derive(Debug, Clone, Default)]
pub struct SlotValues(BTreeMap<String, Vec<String>>);

impl SlotValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<String>) -> Self {
        self.0.insert(name.to_string(), values);
        self
    }

    fn joined(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .filter(|values| !values.is_empty())
            .map(|values| values.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsletterTemplate {
    pub title: String,
    pub sections: Vec<Section>,
    pub closing: String,
}

impl Default for NewsletterTemplate {
    fn default() -> Self {
        Self {
            title: "*Daily Market Newsletter*".to_string(),
            sections: vec![
                Section::slot("*1. Company Insights*", SLOT_COMPANY_INSIGHTS, NO_COMPANY_NEWS),
                Section::slot("*2. Market Trends*", SLOT_MARKET_TRENDS, NO_MARKET_TRENDS),
                Section::fixed(
                    "*3. Risk Analysis*",
                    &[
                        "- Global market conditions remain volatile, with a focus on tech stock trends.",
                        "- Companies like Apple and Tesla are seeing fluctuations based on recent announcements.",
                        "- Inflation rates and monetary policies are critical influencing factors.",
                    ],
                ),
                Section::fixed(
                    "*Highlights:*",
                    &[
                        "- Top gainers today include technology and finance sectors.",
                        "- Ensure to stay ahead of shifts in macroeconomic factors.",
                    ],
                ),
            ],
            closing: "Stay tuned for tomorrow's updates!".to_string(),
        }
    }
}

impl NewsletterTemplate {
    pub fn slot_names(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter_map(|s| match &s.body {
                SectionBody::Slot { name, .. } => Some(name.as_str()),
                SectionBody::Static(_) => None,
            })
            .collect()
    }

    pub fn static_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|s| matches!(s.body, SectionBody::Static(_)))
    }

    pub fn render(&self, values: &SlotValues) -> String {
        let mut blocks = Vec::with_capacity(self.sections.len() + 2);
        blocks.push(self.title.clone());

        for section in &self.sections {
            let body = match &section.body {
                SectionBody::Static(lines) => lines.join("\n"),
                SectionBody::Slot { name, fallback } => {
                    values.joined(name).unwrap_or_else(|| fallback.clone())
                }
            };
            blocks.push(format!("{}\n{}", section.heading, body));
        }

        blocks.push(self.closing.clone());
        blocks.join("\n\n")
    }
}

/// Renders the default template from the two retrieved lists.
pub fn generate_newsletter(company_insights: &[String], market_trends: &[String]) -> String {
    NewsletterTemplate::default().render(
        &SlotValues::new()
            .with(SLOT_COMPANY_INSIGHTS, company_insights.to_vec())
            .with(SLOT_MARKET_TRENDS, market_trends.to_vec()),
    )
}
