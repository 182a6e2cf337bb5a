//! Recursive-descent parsing of the compact query syntax.
//!
//! ```text
//! query  := clause ( separator clause )*
//! clause := [+|-] [field ':'] term [~digits] [^digits]
//! ```
//!
//! The parser walks the lexeme stream produced by
//! [`QueryLexer`](super::lexer::QueryLexer), accumulating one clause at a
//! time and submitting it to the [`Query`] when complete. Errors carry
//! the offending lexeme's byte span in the source string.

use super::lexer::{Lexeme, LexemeKind, QueryLexer};
use super::{Clause, Presence, Query};
use crate::error::{LunariaError, Result};

enum State {
    Clause,
    Presence,
    Field,
    Term,
    EditDistance,
    Boost,
}

/// Parses a query string into clauses on a [`Query`].
pub struct QueryParser<'a> {
    lexemes: Vec<Lexeme>,
    position: usize,
    query: &'a mut Query,
    current_clause: Clause,
}

impl<'a> QueryParser<'a> {
    pub fn new(input: &str, query: &'a mut Query) -> Self {
        QueryParser {
            lexemes: QueryLexer::new(input).run(),
            position: 0,
            query,
            current_clause: Clause::new(""),
        }
    }

    /// Parse every lexeme, adding the resulting clauses to the query.
    pub fn parse(mut self) -> Result<()> {
        let mut state = Some(State::Clause);
        while let Some(current) = state {
            state = match current {
                State::Clause => self.parse_clause()?,
                State::Presence => self.parse_presence()?,
                State::Field => self.parse_field()?,
                State::Term => self.parse_term()?,
                State::EditDistance => self.parse_edit_distance()?,
                State::Boost => self.parse_boost()?,
            };
        }
        Ok(())
    }

    fn parse_clause(&mut self) -> Result<Option<State>> {
        let Some(lexeme) = self.peek() else {
            return Ok(None);
        };

        match lexeme.kind {
            LexemeKind::Presence => Ok(Some(State::Presence)),
            LexemeKind::Field => Ok(Some(State::Field)),
            LexemeKind::Term => Ok(Some(State::Term)),
            _ => Err(Self::unexpected(lexeme, "expected either a field or a term")),
        }
    }

    fn parse_presence(&mut self) -> Result<Option<State>> {
        let lexeme = self.consume()?;

        match lexeme.text.as_str() {
            "-" => self.current_clause.presence = Presence::Prohibited,
            "+" => self.current_clause.presence = Presence::Required,
            other => {
                return Err(Self::unexpected(
                    &lexeme,
                    &format!("unrecognised presence operator '{other}'"),
                ));
            }
        }

        match self.peek() {
            None => Err(LunariaError::query_parse(
                "expecting term or field, found nothing",
                lexeme.start,
                lexeme.end,
            )),
            Some(next) => match next.kind {
                LexemeKind::Field => Ok(Some(State::Field)),
                LexemeKind::Term => Ok(Some(State::Term)),
                _ => Err(Self::unexpected(next, "expecting term or field")),
            },
        }
    }

    fn parse_field(&mut self) -> Result<Option<State>> {
        let lexeme = self.consume()?;

        if !self.query.all_fields().contains(&lexeme.text) {
            let possible = self.query.all_fields().join(", ");
            return Err(LunariaError::query_parse(
                format!(
                    "unrecognised field '{}', possible fields: {possible}",
                    lexeme.text
                ),
                lexeme.start,
                lexeme.end,
            ));
        }

        self.current_clause.fields = Some(vec![lexeme.text.clone()]);

        match self.peek() {
            None => Err(LunariaError::query_parse(
                "expecting term, found nothing",
                lexeme.start,
                lexeme.end,
            )),
            Some(next) => match next.kind {
                LexemeKind::Term => Ok(Some(State::Term)),
                _ => Err(Self::unexpected(next, "expecting term")),
            },
        }
    }

    fn parse_term(&mut self) -> Result<Option<State>> {
        let lexeme = self.consume()?;

        self.current_clause.term = lexeme.text.to_lowercase();
        if lexeme.text.contains('*') {
            self.current_clause.use_pipeline = false;
        }

        self.dispatch_after_term()
    }

    fn parse_edit_distance(&mut self) -> Result<Option<State>> {
        let lexeme = self.consume()?;

        let edit_distance: u32 = lexeme.text.parse().map_err(|_| {
            LunariaError::query_parse("edit distance must be numeric", lexeme.start, lexeme.end)
        })?;
        self.current_clause.edit_distance = edit_distance;

        self.dispatch_after_term()
    }

    fn parse_boost(&mut self) -> Result<Option<State>> {
        let lexeme = self.consume()?;

        let boost: u32 = lexeme.text.parse().map_err(|_| {
            LunariaError::query_parse("boost must be numeric", lexeme.start, lexeme.end)
        })?;
        self.current_clause.boost = boost as f64;

        self.dispatch_after_term()
    }

    /// After a term or one of its modifiers: either the clause is
    /// complete (end of input or the start of the next clause), or a
    /// further modifier follows.
    fn dispatch_after_term(&mut self) -> Result<Option<State>> {
        let Some(next) = self.peek() else {
            self.next_clause();
            return Ok(None);
        };

        match next.kind {
            LexemeKind::Term => {
                self.next_clause();
                Ok(Some(State::Term))
            }
            LexemeKind::Field => {
                self.next_clause();
                Ok(Some(State::Field))
            }
            LexemeKind::Presence => {
                self.next_clause();
                Ok(Some(State::Presence))
            }
            LexemeKind::EditDistance => Ok(Some(State::EditDistance)),
            LexemeKind::Boost => Ok(Some(State::Boost)),
        }
    }

    /// Submit the accumulated clause to the query and start a new one.
    fn next_clause(&mut self) {
        let completed = std::mem::replace(&mut self.current_clause, Clause::new(""));
        self.query.clause(completed);
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.position)
    }

    fn consume(&mut self) -> Result<Lexeme> {
        let end = self.lexemes.last().map(|lexeme| lexeme.end).unwrap_or(0);
        let lexeme = self.lexemes.get(self.position).cloned().ok_or_else(|| {
            LunariaError::query_parse("unexpected end of query", end, end)
        })?;
        self.position += 1;
        Ok(lexeme)
    }

    fn unexpected(lexeme: &Lexeme, message: &str) -> LunariaError {
        LunariaError::query_parse(
            format!("{message}, found '{}'", lexeme.text),
            lexeme.start,
            lexeme.end,
        )
    }
}

/// Parse `input` into clauses on `query`.
pub fn parse(input: &str, query: &mut Query) -> Result<()> {
    QueryParser::new(input, query).parse()
}
