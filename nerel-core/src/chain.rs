//! # Modelo Linear-Chain
//!
//! O modelo estatístico por trás do [`NamedEntityExtractor`](crate::ner::NamedEntityExtractor).
//! O score de uma sequência de rótulos `y` para os tokens `x` é
//!
//! ```text
//! score(y, x) = Σ_i [emission(y_i, x, i) + transition(y_{i-1}, y_i)]
//! emission(y, x, i) = Σ_k w_{k,y} · f_k(x, i)  (+ outside_bias se y = O)
//! ```
//!
//! A decodificação usa Viterbi com as restrições do esquema BIO. O `outside_bias`
//! desloca a fronteira entre "é entidade" e "não é entidade" e é ajustado pelo
//! parâmetro `beta` do treino.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::tagger::{labels_to_detections, Detection, Tag};
use crate::viterbi::viterbi_decode;

/// Pesos de emissão e transição sobre uma tabela de categorias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainModel {
    /// Tabela de tags; o índice é o id da tag.
    categories: Vec<String>,
    /// feature → peso por rótulo (índice denso de [`Tag`]).
    emissions: HashMap<String, Vec<f64>>,
    /// `transitions[prev][next]`.
    transitions: Vec<Vec<f64>>,
    outside_bias: f64,
}

impl ChainModel {
    /// Cria um modelo com pesos zerados.
    pub fn new(categories: Vec<String>) -> Self {
        let n = Tag::count(categories.len());
        Self {
            categories,
            emissions: HashMap::new(),
            transitions: vec![vec![0.0; n]; n],
            outside_bias: 0.0,
        }
    }

    pub(crate) fn from_weights(
        categories: Vec<String>,
        emissions: HashMap<String, Vec<f64>>,
        transitions: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            categories,
            emissions,
            transitions,
            outside_bias: 0.0,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn num_labels(&self) -> usize {
        Tag::count(self.categories.len())
    }

    pub fn outside_bias(&self) -> f64 {
        self.outside_bias
    }

    pub fn set_outside_bias(&mut self, bias: f64) {
        self.outside_bias = bias;
    }

    /// Configura o peso de uma feature para um rótulo.
    pub fn set_emission(&mut self, feature: &str, tag: Tag, weight: f64) {
        let n = self.num_labels();
        self.emissions
            .entry(feature.to_string())
            .or_insert_with(|| vec![0.0; n])[tag.index()] = weight;
    }

    /// Configura o peso de uma transição.
    pub fn set_transition(&mut self, from: Tag, to: Tag, weight: f64) {
        self.transitions[from.index()][to.index()] = weight;
    }

    fn emission_scores(&self, fvs: &[FeatureVector], outside_bias: f64) -> Vec<Vec<f64>> {
        let n = self.num_labels();
        fvs.iter()
            .map(|fv| {
                let mut row = vec![0.0; n];
                for (name, value) in &fv.features {
                    if let Some(w) = self.emissions.get(name) {
                        for (r, w) in row.iter_mut().zip(w) {
                            *r += value * w;
                        }
                    }
                }
                row[Tag::Outside.index()] += outside_bias;
                row
            })
            .collect()
    }

    /// Detecções para uma sentença já convertida em features.
    pub fn decode(&self, fvs: &[FeatureVector]) -> Vec<Detection> {
        self.decode_with_bias(fvs, self.outside_bias)
    }

    pub(crate) fn decode_with_bias(&self, fvs: &[FeatureVector], outside_bias: f64) -> Vec<Detection> {
        if fvs.is_empty() {
            return Vec::new();
        }
        let emission = self.emission_scores(fvs, outside_bias);
        let labels = viterbi_decode(&emission, &self.transitions);
        let margins: Vec<f64> = labels
            .iter()
            .zip(&emission)
            .map(|(label, row)| {
                let chosen = label.index();
                let best_other = row
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != chosen)
                    .map(|(_, s)| *s)
                    .fold(f64::NEG_INFINITY, f64::max);
                if best_other.is_finite() {
                    row[chosen] - best_other
                } else {
                    row[chosen]
                }
            })
            .collect();
        labels_to_detections(&labels, &margins)
    }

    /// Confere dimensões e valores após desserializar.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let n = self.num_labels();
        if self.transitions.len() != n || self.transitions.iter().any(|row| row.len() != n) {
            return Err(format!("matriz de transição deveria ser {n}x{n}"));
        }
        if let Some((name, _)) = self.emissions.iter().find(|(_, w)| w.len() != n) {
            return Err(format!("feature {name:?} com número errado de pesos"));
        }
        let all_finite = self.outside_bias.is_finite()
            && self.transitions.iter().flatten().all(|w| w.is_finite())
            && self.emissions.values().flatten().all(|w| w.is_finite());
        if !all_finite {
            return Err("pesos não finitos".to_string());
        }
        Ok(())
    }
}
