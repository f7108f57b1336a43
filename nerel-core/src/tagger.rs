//! # Esquema de Tags BIO
//!
//! As categorias não são fixas: cada modelo tem sua própria tabela de tags
//! (ex: `["PERSON", "LOCATION", "ORGANIZATION"]`) e o rótulo de cada token é
//! uma tag BIO sobre o índice da categoria nessa tabela.
//!
//! - `B-X`: primeiro token de uma entidade da categoria `X`
//! - `I-X`: tokens seguintes da mesma entidade
//! - `O`: fora de qualquer entidade
//!
//! Índices densos: `O` → 0, `B-c` → `1 + 2c`, `I-c` → `2 + 2c`.

use serde::{Deserialize, Serialize};

/// Rótulo BIO de um token, sobre o índice da categoria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Outside,
    Begin(usize),
    Inside(usize),
}

impl Tag {
    /// Índice denso do rótulo (linha/coluna das matrizes de peso).
    pub fn index(self) -> usize {
        match self {
            Tag::Outside => 0,
            Tag::Begin(c) => 1 + 2 * c,
            Tag::Inside(c) => 2 + 2 * c,
        }
    }

    pub fn from_index(index: usize) -> Tag {
        match index {
            0 => Tag::Outside,
            i if i % 2 == 1 => Tag::Begin((i - 1) / 2),
            i => Tag::Inside((i - 2) / 2),
        }
    }

    /// Número de rótulos para `num_categories` categorias.
    pub fn count(num_categories: usize) -> usize {
        1 + 2 * num_categories
    }

    pub fn category(self) -> Option<usize> {
        match self {
            Tag::Begin(c) | Tag::Inside(c) => Some(c),
            Tag::Outside => None,
        }
    }

    /// `I-X` nunca abre uma sentença.
    pub fn can_start(self) -> bool {
        !matches!(self, Tag::Inside(_))
    }

    /// `I-X` só pode seguir `B-X` ou `I-X` da mesma categoria.
    pub fn is_valid_transition(prev: Tag, next: Tag) -> bool {
        match next {
            Tag::Inside(cat) => prev.category() == Some(cat),
            _ => true,
        }
    }
}

/// Detecção bruta do modelo: `(tag, pos, len, score)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Índice da categoria na tabela de tags do modelo.
    pub tag: usize,
    pub pos: usize,
    pub len: usize,
    pub score: f64,
}

/// Converte uma sequência de rótulos BIO em detecções ordenadas por posição.
///
/// `margins[i]` é a confiança do rótulo do token `i`; o score da detecção é a média
/// das margens dos seus tokens. Um `I-X` órfão (que não segue `B-X`/`I-X`) abre uma
/// nova entidade.
pub fn labels_to_detections(labels: &[Tag], margins: &[f64]) -> Vec<Detection> {
    let mut detections = Vec::new();
    let mut i = 0;

    while i < labels.len() {
        let Some(cat) = labels[i].category() else {
            i += 1;
            continue;
        };
        let mut j = i + 1;
        while j < labels.len() && labels[j] == Tag::Inside(cat) {
            j += 1;
        }
        let score = margins[i..j].iter().sum::<f64>() / (j - i) as f64;
        detections.push(Detection {
            tag: cat,
            pos: i,
            len: j - i,
            score,
        });
        i = j;
    }

    detections
}

/// Sequência de rótulos gold para trechos anotados `(start, len, categoria)`.
///
/// Os trechos precisam estar dentro da sequência e não se sobrepor.
pub fn spans_to_labels(num_tokens: usize, spans: &[(usize, usize, usize)]) -> Vec<Tag> {
    let mut labels = vec![Tag::Outside; num_tokens];
    for &(start, len, cat) in spans {
        labels[start] = Tag::Begin(cat);
        for label in &mut labels[start + 1..start + len] {
            *label = Tag::Inside(cat);
        }
    }
    labels
}
