use super::ast::*;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "action.pest"]
pub struct ActionParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unrecognized action syntax: {input}")]
    Syntax {
        input: String,
        #[source]
        source: Box<pest::error::Error<Rule>>,
    },
    #[error("Empty action")]
    Empty,
    #[error("Unknown rule: {0:?}")]
    UnknownRule(Rule),
    #[error("Invalid step number: {0}")]
    InvalidStep(String),
}

/// Parse one action line into an [`Action`].
pub fn parse_action(input: &str) -> Result<Action, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut pairs = ActionParser::parse(Rule::line, trimmed).map_err(|e| ParseError::Syntax {
        input: trimmed.to_string(),
        source: Box::new(e),
    })?;

    let line = pairs.next().ok_or(ParseError::Empty)?;
    let inner = line
        .into_inner()
        .find(|p| p.as_rule() != Rule::EOI)
        .ok_or(ParseError::Empty)?;
    build_action(inner)
}

fn build_action(pair: Pair<Rule>) -> Result<Action, ParseError> {
    let rule = pair.as_rule();
    let text = pair.as_str().to_string();
    let mut inner = pair.into_inner();

    match rule {
        Rule::open_page => Ok(Action::Navigate {
            url: next_string(&mut inner),
        }),
        Rule::wait_ready => Ok(Action::WaitReady),
        Rule::wait_url_change => Ok(Action::WaitUrlChange {
            pattern: inner.next().map(string_value),
        }),
        Rule::wait_either => {
            let first = Target::parse(&next_string(&mut inner));
            let second = Target::parse(&next_string(&mut inner));
            Ok(Action::WaitForEither { first, second })
        }
        Rule::wait_for => Ok(Action::WaitFor {
            target: Target::parse(&next_string(&mut inner)),
        }),
        Rule::if_exists => {
            let target = Target::parse(&next_string(&mut inner));
            let step = next_step(&mut inner, &text)?;
            Ok(Action::IfExists {
                target,
                step,
                chained: false,
            })
        }
        Rule::else_if_exists => {
            let nested = inner.next().ok_or(ParseError::Empty)?;
            match build_action(nested)? {
                Action::IfExists { target, step, .. } => Ok(Action::IfExists {
                    target,
                    step,
                    chained: true,
                }),
                _ => Err(ParseError::UnknownRule(rule)),
            }
        }
        Rule::if_url => {
            let pattern = next_string(&mut inner);
            let step = next_step(&mut inner, &text)?;
            Ok(Action::IfUrlContains { pattern, step })
        }
        Rule::if_visible => Ok(Action::IfVisible {
            target: Target::parse(&next_string(&mut inner)),
        }),
        Rule::else_goto => Ok(Action::Else {
            step: Some(next_step(&mut inner, &text)?),
        }),
        Rule::else_plain => Ok(Action::Else { step: None }),
        Rule::type_text => {
            let target = Target::parse(&next_string(&mut inner));
            let text = next_string(&mut inner);
            Ok(Action::Type { target, text })
        }
        Rule::click => Ok(Action::Click {
            target: Target::parse(&next_string(&mut inner)),
        }),
        Rule::press => Ok(Action::Press {
            key: next_string(&mut inner),
        }),
        Rule::assert_present => Ok(Action::Assert {
            target: Target::parse(&next_string(&mut inner)),
        }),
        Rule::comment => Ok(Action::Comment(
            inner
                .next()
                .map(|p| p.as_str().trim().to_string())
                .unwrap_or_default(),
        )),
        other => Err(ParseError::UnknownRule(other)),
    }
}

fn string_value(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|body| body.as_str().to_string())
        .unwrap_or_default()
}

fn next_string(inner: &mut Pairs<Rule>) -> String {
    inner.next().map(string_value).unwrap_or_default()
}

fn next_step(inner: &mut Pairs<Rule>, context: &str) -> Result<u32, ParseError> {
    let pair = inner
        .next()
        .ok_or_else(|| ParseError::InvalidStep(context.to_string()))?;
    pair.as_str()
        .parse()
        .map_err(|_| ParseError::InvalidStep(pair.as_str().to_string()))
}
