//! # Instâncias de Treino
//!
//! Uma [`TrainingInstance`] é uma sentença tokenizada mais os trechos anotados
//! `(start, len, label)`. Os tokens são copiados na construção e não mudam depois.
//!
//! Aqui só se valida `start >= 0`. Sobreposições e trechos além do fim passam adiante:
//! quem decide é o [`NerTrainer`](crate::trainer::NerTrainer) ao receber a instância.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{NerError, Result};
use crate::tokenizer::tokenize;

/// Trecho anotado de uma instância de treino.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub start: usize,
    pub len: usize,
    pub label: String,
}

impl Annotation {
    /// Fim exclusivo do trecho; satura em `usize::MAX` em vez de estourar.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.len)
    }

    fn overlaps(&self, start: usize, len: usize) -> bool {
        self.start < start.saturating_add(len) && start < self.end()
    }
}

/// Sentença de treino com suas anotações, na ordem em que foram adicionadas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInstance {
    tokens: Vec<String>,
    annotations: Vec<Annotation>,
}

impl TrainingInstance {
    pub fn new<S: AsRef<str>>(tokens: &[S]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
            annotations: Vec::new(),
        }
    }

    /// Tokeniza com o mesmo tokenizador da extração, para que as posições batam.
    pub fn from_text(text: &str) -> Self {
        Self {
            tokens: tokenize(text),
            annotations: Vec::new(),
        }
    }

    /// Anota o trecho `[start, start + length)` com `label`.
    ///
    /// `start < 0` falha com [`NerError::InvalidSpan`] e não altera a instância.
    /// Duplicatas e sobreposições são aceitas aqui.
    pub fn add_entity(&mut self, start: isize, length: usize, label: &str) -> Result<()> {
        let Ok(pos) = usize::try_from(start) else {
            return Err(NerError::InvalidSpan { start });
        };
        trace!(start = pos, len = length, label, "anotação adicionada");
        self.annotations.push(Annotation {
            start: pos,
            len: length,
            label: label.to_string(),
        });
        Ok(())
    }

    pub fn num_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub fn num_entities(&self) -> usize {
        self.annotations.len()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// `true` se `[start, start + len)` cruza algum trecho já anotado.
    pub fn overlaps_any_entity(&self, start: usize, len: usize) -> bool {
        len > 0 && self.annotations.iter().any(|a| a.overlaps(start, len))
    }

    /// Libera a instância.
    pub fn close(self) {}
}
