//! # Detectores de Relação Binária
//!
//! Um [`RelationDetector`] é um classificador linear para **um** tipo de relação
//! (ex: `people.person.place_of_birth`). Ele pontua candidatos direcionados
//! ([`BinaryRelation`]) montados por
//! [`NamedEntityExtractor::extract_binary_relation`]; score `> 0` significa que a
//! relação vale.
//!
//! O detector guarda a identificação do extrator de features com que foi treinado e
//! recusa candidatos montados por outro extrator.
//!
//! O [`RelationTrainer`] treina um detector novo a partir de pares positivos e negativos.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::error::{NerError, Result};
use crate::features::FeatureVector;
use crate::ner::NamedEntityExtractor;
use crate::perceptron::BinaryPerceptron;
use crate::storage::{self, ModelFile, ModelFileRef};

/// Candidato a relação `arg1 → arg2`, já convertido em features.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRelation {
    pub arg1: Range<usize>,
    pub arg2: Range<usize>,
    pub features: FeatureVector,
    /// Fingerprint do extrator de features que gerou `features`.
    pub(crate) feature_extractor: String,
}

/// Handle de um detector de relação.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelationDetector {
    name: String,
    /// Fingerprint do extrator exigido; `None` aceita qualquer um.
    #[serde(default)]
    feature_extractor: Option<String>,
    #[serde(default)]
    bias: f64,
    #[serde(default)]
    weights: HashMap<String, f64>,
}

impl RelationDetector {
    /// Cria um detector vazio (score = 0 para tudo, ou seja, nunca dispara).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_extractor: None,
            bias: 0.0,
            weights: HashMap::new(),
        }
    }

    /// Amarra o detector ao extrator de features do modelo NER.
    pub fn for_extractor(mut self, ner: &NamedEntityExtractor) -> Self {
        self.feature_extractor = Some(ner.fingerprint().to_string());
        self
    }

    pub fn set_weight(&mut self, feature: &str, weight: f64) {
        self.weights.insert(feature.to_string(), weight);
    }

    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match storage::read(path)? {
            ModelFile::RelationDetector { detector, .. } => {
                let all_finite =
                    detector.bias.is_finite() && detector.weights.values().all(|w| w.is_finite());
                if !all_finite {
                    return Err(NerError::load(path, "pesos não finitos"));
                }
                debug!(path = %path.display(), name = %detector.name, "detector de relação carregado");
                Ok(detector)
            }
            other => Err(NerError::load(
                path,
                format!("esperado relation_detector, encontrado {}", other.kind_name()),
            )),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        storage::write(path.as_ref(), &ModelFileRef::relation_detector(self))
    }

    /// Nome canônico do tipo de relação.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Score do candidato; `> 0` indica que a relação vale.
    pub fn classify(&self, relation: &BinaryRelation) -> Result<f64> {
        if let Some(expected) = &self.feature_extractor {
            if *expected != relation.feature_extractor {
                return Err(NerError::Classification(format!(
                    "detector {} foi treinado com outro extrator de features",
                    self.name
                )));
            }
        }
        Ok(self.bias + relation.features.dot(&self.weights))
    }

    /// Libera o detector.
    pub fn close(self) {}
}

impl Drop for RelationDetector {
    fn drop(&mut self) {
        trace!(name = %self.name, "detector de relação liberado");
    }
}

/// Treinador de um detector de relação a partir de exemplos rotulados.
pub struct RelationTrainer<'a> {
    name: String,
    ner: &'a NamedEntityExtractor,
    positives: Vec<BinaryRelation>,
    negatives: Vec<BinaryRelation>,
    epochs: usize,
}

impl<'a> RelationTrainer<'a> {
    /// Os candidatos são montados com o extrator de features de `ner`.
    pub fn new(name: impl Into<String>, ner: &'a NamedEntityExtractor) -> Self {
        Self {
            name: name.into(),
            ner,
            positives: Vec::new(),
            negatives: Vec::new(),
            epochs: 20,
        }
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs.max(1);
        self
    }

    /// Registra um par em que a relação `arg1 → arg2` vale.
    pub fn add_positive_binary_relation<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        arg1: Range<usize>,
        arg2: Range<usize>,
    ) -> Result<()> {
        let rel = self.candidate(tokens, arg1, arg2)?;
        self.positives.push(rel);
        Ok(())
    }

    /// Registra um par em que a relação `arg1 → arg2` não vale.
    pub fn add_negative_binary_relation<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        arg1: Range<usize>,
        arg2: Range<usize>,
    ) -> Result<()> {
        let rel = self.candidate(tokens, arg1, arg2)?;
        self.negatives.push(rel);
        Ok(())
    }

    fn candidate<S: AsRef<str>>(
        &self,
        tokens: &[S],
        arg1: Range<usize>,
        arg2: Range<usize>,
    ) -> Result<BinaryRelation> {
        self.ner
            .extract_binary_relation(tokens, arg1, arg2)
            .map_err(|e| NerError::RejectedInstance(e.to_string()))
    }

    pub fn num_positive_examples(&self) -> usize {
        self.positives.len()
    }

    pub fn num_negative_examples(&self) -> usize {
        self.negatives.len()
    }

    /// Treina o detector; exige ao menos um exemplo positivo e um negativo.
    pub fn train(&self) -> Result<RelationDetector> {
        if self.positives.is_empty() || self.negatives.is_empty() {
            return Err(NerError::TrainingFailure(format!(
                "são necessários exemplos positivos e negativos (positivos={}, negativos={})",
                self.positives.len(),
                self.negatives.len()
            )));
        }

        // intercala positivos e negativos para o perceptron não ver só uma classe por vez
        let mut examples: Vec<(&FeatureVector, bool)> = Vec::new();
        let longest = self.positives.len().max(self.negatives.len());
        for i in 0..longest {
            if let Some(p) = self.positives.get(i) {
                examples.push((&p.features, true));
            }
            if let Some(n) = self.negatives.get(i) {
                examples.push((&n.features, false));
            }
        }

        let mut perceptron = BinaryPerceptron::new();
        for epoch in 0..self.epochs {
            let mut mistakes = 0;
            for (fv, positive) in &examples {
                if perceptron.train_example(fv, *positive) {
                    mistakes += 1;
                }
            }
            if mistakes == 0 {
                debug!(epoch, "treino de relação convergiu");
                break;
            }
        }

        let (bias, weights) = perceptron.finalize();
        if !bias.is_finite() || weights.values().any(|w| !w.is_finite()) {
            return Err(NerError::TrainingFailure("divergência numérica".into()));
        }
        info!(
            name = %self.name,
            positives = self.positives.len(),
            negatives = self.negatives.len(),
            "detector de relação treinado"
        );
        Ok(RelationDetector {
            name: self.name.clone(),
            feature_extractor: Some(self.ner.fingerprint().to_string()),
            bias,
            weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ner::tests::{sample_extractor, TEXT};
    use crate::tokenizer::tokenize;

    const PLACE_OF_BIRTH: &str = "people.person.place_of_birth";

    #[test]
    fn test_classify_hand_weighted_detector() {
        let ner = sample_extractor();
        let tokens = tokenize(TEXT);
        let mut rd = RelationDetector::new(PLACE_OF_BIRTH).for_extractor(&ner);
        rd.set_bias(-1.0);
        rd.set_weight("ltr_between=born", 2.0);

        let forward = ner.extract_binary_relation(&tokens, 0..2, 5..6).unwrap();
        let reverse = ner.extract_binary_relation(&tokens, 5..6, 0..2).unwrap();
        assert!((rd.classify(&forward).unwrap() - 1.0).abs() < 1e-9);
        assert!((rd.classify(&reverse).unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(rd.name(), PLACE_OF_BIRTH);
    }

    #[test]
    fn test_classify_rejects_other_feature_extractor() {
        let ner = sample_extractor();
        let mut rd = RelationDetector::new(PLACE_OF_BIRTH);
        rd.feature_extractor = Some("outro".into());
        let rel = ner
            .extract_binary_relation(&tokenize(TEXT), 0..2, 5..6)
            .unwrap();
        assert!(matches!(
            rd.classify(&rel),
            Err(NerError::Classification(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rd.json");
        let mut rd = RelationDetector::new(PLACE_OF_BIRTH);
        rd.set_weight("ltr_between=born", 2.0);
        rd.save(&path).unwrap();

        let loaded = RelationDetector::load(&path).unwrap();
        assert_eq!(loaded.name(), PLACE_OF_BIRTH);
        assert_eq!(loaded.weights, rd.weights);
    }

    #[test]
    fn test_load_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ner.json");
        sample_extractor().save(&path).unwrap();
        assert!(matches!(
            RelationDetector::load(&path),
            Err(NerError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_relation_trainer() {
        let ner = sample_extractor();
        let mut trainer = RelationTrainer::new(PLACE_OF_BIRTH, &ner);

        let born = tokenize("Mary Jones was born in Boston.");
        let visited = tokenize("Peter Brown visited Denver yesterday.");
        trainer.add_positive_binary_relation(&born, 0..2, 5..6).unwrap();
        trainer.add_negative_binary_relation(&born, 5..6, 0..2).unwrap();
        trainer.add_negative_binary_relation(&visited, 0..2, 3..4).unwrap();
        assert!(trainer.add_positive_binary_relation(&born, 0..2, 1..3).is_err());
        assert_eq!(trainer.num_positive_examples(), 1);
        assert_eq!(trainer.num_negative_examples(), 2);

        let rd = trainer.train().unwrap();
        let positive = ner.extract_binary_relation(&born, 0..2, 5..6).unwrap();
        let negative = ner.extract_binary_relation(&visited, 0..2, 3..4).unwrap();
        assert!(rd.classify(&positive).unwrap() > 0.0);
        assert!(rd.classify(&negative).unwrap() <= 0.0);
    }

    #[test]
    fn test_relation_trainer_needs_both_classes() {
        let ner = sample_extractor();
        let mut trainer = RelationTrainer::new(PLACE_OF_BIRTH, &ner);
        let born = tokenize("Mary Jones was born in Boston.");
        trainer.add_positive_binary_relation(&born, 0..2, 5..6).unwrap();
        assert!(matches!(
            trainer.train(),
            Err(NerError::TrainingFailure(_))
        ));
    }
}
