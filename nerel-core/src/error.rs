//! # Erros do Toolkit
//!
//! Todas as falhas são devolvidas como [`NerError`] para quem chamou. A única falha
//! que o próprio crate engole é [`NerError::Classification`] durante o pareamento de
//! relações, onde ela significa apenas "nenhuma relação encontrada".

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Tipos de erro das operações de carga, extração e treino.
#[derive(Error, Debug)]
pub enum NerError {
    /// Arquivo de modelo ausente, ilegível, corrompido ou de outro tipo.
    #[error("falha ao carregar modelo {path}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    /// Anotação de treino com posição inicial negativa.
    #[error("posição inicial inválida: {start} < 0")]
    InvalidSpan { start: isize },

    /// O algoritmo de treino recusou a instância.
    #[error("instância de treino rejeitada: {0}")]
    RejectedInstance(String),

    /// O treino não conseguiu produzir um modelo.
    #[error("falha no treino: {0}")]
    TrainingFailure(String),

    /// O modelo não pôde ser persistido; o handle em memória continua válido.
    #[error("falha ao salvar modelo {path}: {reason}")]
    SaveFailure { path: PathBuf, reason: String },

    /// Falha interna ao montar ou classificar uma relação binária.
    #[error("falha na classificação de relação: {0}")]
    Classification(String),
}

impl NerError {
    pub(crate) fn load(path: &Path, reason: impl ToString) -> Self {
        NerError::LoadFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn save(path: &Path, reason: impl ToString) -> Self {
        NerError::SaveFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NerError>;
