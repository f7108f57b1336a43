//! # Tokenizador
//!
//! Divide o texto bruto em tokens (palavras e pontuações) usando as fronteiras de
//! palavra do Unicode (UAX #29). Espaços em branco nunca viram tokens.
//!
//! O mesmo tokenizador é usado na extração e na construção de instâncias de treino,
//! então as posições dos tokens são sempre reproduzíveis: chamar [`tokenize`] e depois
//! extrair sobre os tokens produz o mesmo resultado que extrair direto do texto.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use nerel_core::tokenizer::{tokenize, tokenize_with_offsets};
//!
//! let text = "John Smith was born in Huntsville, Alabama.";
//! let tokens = tokenize(text);
//! assert_eq!(tokens[6], ",");
//!
//! let (tokens, offsets) = tokenize_with_offsets(text);
//! assert_eq!(&text[offsets[5]..offsets[5] + tokens[5].len()], "Huntsville");
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Um token extraído do texto original.
///
/// Mantém a posição exata no texto (`start` e `end`, em bytes) e a ordem na sequência.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Huntsville", ",").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusivo).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

/// Tokeniza o texto e devolve os tokens com posições.
pub fn tokenize_tokens(text: &str) -> Vec<Token> {
    text.split_word_bound_indices()
        .filter(|(_, segment)| !segment.chars().all(char::is_whitespace))
        .enumerate()
        .map(|(index, (start, segment))| Token {
            text: segment.to_string(),
            start,
            end: start + segment.len(),
            index,
        })
        .collect()
}

/// Tokeniza o texto do mesmo jeito que o treino e a extração fazem.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_tokens(text).into_iter().map(|t| t.text).collect()
}

/// Igual a [`tokenize`], mas também devolve o offset em bytes do início de cada token.
pub fn tokenize_with_offsets(text: &str) -> (Vec<String>, Vec<usize>) {
    tokenize_tokens(text)
        .into_iter()
        .map(|t| (t.text, t.start))
        .unzip()
}
