//! # Entidades e Relacionamentos
//!
//! O vocabulário compartilhado dos resultados: cada [`Entity`] é um trecho contíguo de
//! tokens com categoria e score, e pode carregar [`Relationship`]s direcionais para a
//! entidade vizinha.

use serde::{Deserialize, Serialize};

/// Uma entidade nomeada extraída por um
/// [`NamedEntityExtractor`](crate::ner::NamedEntityExtractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Texto da entidade: os tokens `[pos, pos + len)` unidos por um espaço.
    pub name: String,
    /// Índice do primeiro token na sequência.
    pub pos: usize,
    /// Tamanho em tokens (2 para "John Smith", 1 para "John").
    pub len: usize,
    /// Id numérico da tag, relativo ao modelo que produziu a entidade.
    pub tag: usize,
    /// Nome da tag (ex: "PERSON"), resolvido na hora da extração.
    pub tag_str: String,
    /// Confiança da detecção; maior é melhor, sem faixa fixa.
    pub score: f64,
    /// Relações em que esta entidade é a origem, na ordem de descoberta.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    /// Índice (exclusivo) do token logo após a entidade.
    pub fn end(&self) -> usize {
        self.pos + self.len
    }

    /// Cópia da entidade sem relações, usada como ponta de um [`Relationship`].
    pub(crate) fn detached(&self) -> Entity {
        Entity {
            relationships: Vec::new(),
            ..self.clone()
        }
    }
}

/// Relação binária encontrada por um
/// [`RelationDetector`](crate::relation::RelationDetector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Nome do tipo de relação (ex: "people.person.place_of_birth").
    pub name: String,
    /// A entidade na outra ponta; cópia por valor, sem as relações dela.
    pub other: Entity,
    /// Score do classificador; sempre > 0.
    pub score: f64,
}
