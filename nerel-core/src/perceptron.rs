//! # Averaged Perceptron
//!
//! Algoritmo online e *mistake-driven*: processa um exemplo por vez e só mexe nos
//! pesos quando a predição erra. O modelo final usa a **média** dos pesos ao longo de
//! todos os passos, o que estabiliza o aprendizado.
//!
//! Duas variantes:
//! - [`SequencePerceptron`]: perceptron estruturado sobre sequências BIO (decodifica
//!   com Viterbi e atualiza emissões e transições). Produz um [`ChainModel`].
//! - [`BinaryPerceptron`]: classificador binário usado pelos detectores de relação.
//!
//! ## Lazy Averaging
//! Somar todos os pesos a cada passo custaria `O(N·T)`. Cada peso guarda o passo da
//! última atualização e só acumula a soma quando muda, o que dá a mesma média.

use std::collections::HashMap;

use crate::chain::ChainModel;
use crate::features::FeatureVector;
use crate::tagger::Tag;
use crate::viterbi::viterbi_decode;

/// Peso com acumulador para a média preguiçosa.
#[derive(Debug, Clone, Copy, Default)]
struct AveragedWeight {
    value: f64,
    total: f64,
    last: usize,
}

impl AveragedWeight {
    fn add(&mut self, step: usize, delta: f64) {
        // acumula o valor antigo desde a última mudança
        self.total += (step - self.last) as f64 * self.value;
        self.last = step;
        self.value += delta;
    }

    fn averaged(&self, steps: usize) -> f64 {
        if steps == 0 {
            return self.value;
        }
        (self.total + (steps - self.last) as f64 * self.value) / steps as f64
    }
}

/// Perceptron estruturado para sequências BIO.
#[derive(Debug, Clone)]
pub struct SequencePerceptron {
    num_labels: usize,
    emissions: HashMap<String, Vec<AveragedWeight>>,
    transitions: Vec<Vec<AveragedWeight>>,
    steps: usize,
}

impl SequencePerceptron {
    pub fn new(num_categories: usize) -> Self {
        let n = Tag::count(num_categories);
        Self {
            num_labels: n,
            emissions: HashMap::new(),
            transitions: vec![vec![AveragedWeight::default(); n]; n],
            steps: 0,
        }
    }

    /// Predição com os pesos correntes (não médios), como exige o treino.
    pub fn predict(&self, fvs: &[FeatureVector]) -> Vec<Tag> {
        let emission: Vec<Vec<f64>> = fvs
            .iter()
            .map(|fv| {
                let mut row = vec![0.0; self.num_labels];
                for (name, value) in &fv.features {
                    if let Some(w) = self.emissions.get(name) {
                        for (r, w) in row.iter_mut().zip(w) {
                            *r += value * w.value;
                        }
                    }
                }
                row
            })
            .collect();
        let transitions: Vec<Vec<f64>> = self
            .transitions
            .iter()
            .map(|row| row.iter().map(|w| w.value).collect())
            .collect();
        viterbi_decode(&emission, &transitions)
    }

    /// Processa uma sentença; devolve `true` se a predição errou (e os pesos mudaram).
    ///
    /// Atualização: `w += Φ(x, gold) − Φ(x, predito)`, só nas posições que diferem.
    pub fn train_sequence(&mut self, fvs: &[FeatureVector], gold: &[Tag]) -> bool {
        let predicted = self.predict(fvs);
        let mistake = predicted != gold;

        if mistake {
            let step = self.steps;
            for i in 0..gold.len() {
                let (g, p) = (gold[i], predicted[i]);
                if g != p {
                    for (name, value) in &fvs[i].features {
                        let n = self.num_labels;
                        let weights = self
                            .emissions
                            .entry(name.clone())
                            .or_insert_with(|| vec![AveragedWeight::default(); n]);
                        weights[g.index()].add(step, *value);
                        weights[p.index()].add(step, -*value);
                    }
                }
                if i > 0 && (gold[i - 1], g) != (predicted[i - 1], p) {
                    self.transitions[gold[i - 1].index()][g.index()].add(step, 1.0);
                    self.transitions[predicted[i - 1].index()][p.index()].add(step, -1.0);
                }
            }
        }

        self.steps += 1;
        mistake
    }

    /// Calcula as médias e devolve o modelo final.
    pub fn finalize(self, categories: Vec<String>) -> ChainModel {
        let steps = self.steps;
        let emissions = self
            .emissions
            .into_iter()
            .map(|(name, weights)| {
                let averaged = weights.iter().map(|w| w.averaged(steps)).collect();
                (name, averaged)
            })
            .collect();
        let transitions = self
            .transitions
            .iter()
            .map(|row| row.iter().map(|w| w.averaged(steps)).collect())
            .collect();
        ChainModel::from_weights(categories, emissions, transitions)
    }
}

/// Perceptron binário médio: `score = w·x + b`, positivo quando `score > 0`.
#[derive(Debug, Clone, Default)]
pub struct BinaryPerceptron {
    weights: HashMap<String, AveragedWeight>,
    bias: AveragedWeight,
    steps: usize,
}

impl BinaryPerceptron {
    pub fn new() -> Self {
        Self::default()
    }

    fn score(&self, fv: &FeatureVector) -> f64 {
        self.bias.value
            + fv
                .features
                .iter()
                .filter_map(|(name, v)| self.weights.get(name).map(|w| v * w.value))
                .sum::<f64>()
    }

    /// Processa um exemplo; devolve `true` se errou.
    pub fn train_example(&mut self, fv: &FeatureVector, positive: bool) -> bool {
        let y = if positive { 1.0 } else { -1.0 };
        let mistake = y * self.score(fv) <= 0.0;
        if mistake {
            let step = self.steps;
            for (name, value) in &fv.features {
                self.weights
                    .entry(name.clone())
                    .or_default()
                    .add(step, y * value);
            }
            self.bias.add(step, y);
        }
        self.steps += 1;
        mistake
    }

    /// Devolve `(bias, pesos)` médios.
    pub fn finalize(self) -> (f64, HashMap<String, f64>) {
        let steps = self.steps;
        let weights = self
            .weights
            .into_iter()
            .map(|(name, w)| (name, w.averaged(steps)))
            .filter(|(_, w)| *w != 0.0)
            .collect();
        (self.bias.averaged(steps), weights)
    }
}
