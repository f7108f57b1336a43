//! # Treinador NER
//!
//! O [`NerTrainer`] junta instâncias de treino e um extrator de features e produz um
//! [`NamedEntityExtractor`] novo. O treinador não extrai nada: depois de
//! [`train`](NerTrainer::train) o modelo resultante é independente dele.
//!
//! ## Etapas do treino
//! 1. Categorias na ordem em que aparecem nas anotações
//! 2. Features de cada instância, em paralelo no pool de `num_threads`
//! 3. Épocas do perceptron estruturado, sequenciais (o modelo não depende de `num_threads`)
//! 4. Ajuste do `outside_bias` pela medida F-beta sobre as próprias instâncias
//!
//! ## Beta
//! `F = (1 + β²)·P·R / (β²·P + R)`. Com `β < 1` pesa mais a precisão (menos alarmes
//! falsos), com `β > 1` pesa mais o recall e `β = 0` é a precisão pura.

use std::collections::HashSet;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chain::ChainModel;
use crate::error::{NerError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::ner::NamedEntityExtractor;
use crate::perceptron::SequencePerceptron;
use crate::tagger::{labels_to_detections, spans_to_labels, Tag};
use crate::training::TrainingInstance;

/// Deslocamentos do `outside_bias` testados no ajuste por beta, em ordem de preferência.
const BIAS_GRID: [f64; 9] = [0.0, -0.5, 0.5, -1.0, 1.0, -2.0, 2.0, -4.0, 4.0];

/// Opções do treino.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerOptions {
    /// Número máximo de passadas sobre as instâncias.
    pub epochs: usize,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self { epochs: 25 }
    }
}

/// Acumula instâncias de treino para um modelo NER.
#[derive(Debug)]
pub struct NerTrainer {
    feature_extractor: FeatureExtractor,
    instances: Vec<TrainingInstance>,
    options: TrainerOptions,
}

/// Instância já convertida: features por token e rótulos gold.
struct Prepared {
    features: Vec<FeatureVector>,
    gold: Vec<Tag>,
}

impl NerTrainer {
    /// Cria um treinador com o extrator de features salvo em `path`.
    pub fn new(feature_extractor_path: impl AsRef<Path>) -> Result<Self> {
        let fe = FeatureExtractor::load(feature_extractor_path)?;
        Ok(Self::with_feature_extractor(fe))
    }

    pub fn with_feature_extractor(feature_extractor: FeatureExtractor) -> Self {
        Self {
            feature_extractor,
            instances: Vec::new(),
            options: TrainerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TrainerOptions) -> Self {
        self.options = options;
        self
    }

    /// Número de instâncias aceitas.
    pub fn size(&self) -> usize {
        self.instances.len()
    }

    /// Adiciona uma cópia da instância.
    ///
    /// Rejeita instâncias sem tokens e anotações vazias, fora da sentença, sem rótulo
    /// ou sobrepostas. Uma rejeição não altera o treinador.
    pub fn add_instance(&mut self, instance: &TrainingInstance) -> Result<()> {
        let n = instance.num_tokens();
        if n == 0 {
            return Err(NerError::RejectedInstance("instância sem tokens".into()));
        }
        let annotations = instance.annotations();
        for (i, a) in annotations.iter().enumerate() {
            if a.len == 0 {
                return Err(NerError::RejectedInstance(format!(
                    "anotação {i} tem comprimento zero"
                )));
            }
            if a.end() > n {
                return Err(NerError::RejectedInstance(format!(
                    "anotação {i} ({}..{}) passa do fim da sentença ({n} tokens)",
                    a.start,
                    a.end()
                )));
            }
            if a.label.is_empty() {
                return Err(NerError::RejectedInstance(format!("anotação {i} sem rótulo")));
            }
            if let Some(j) = annotations[..i]
                .iter()
                .position(|b| b.start < a.end() && a.start < b.end())
            {
                return Err(NerError::RejectedInstance(format!(
                    "anotações {j} e {i} se sobrepõem"
                )));
            }
        }
        self.instances.push(instance.clone());
        Ok(())
    }

    /// Treina um modelo novo.
    ///
    /// `num_threads <= 0` vale como 1 e `beta <= 0` vale como 0.
    pub fn train(&self, num_threads: isize, beta: f64) -> Result<NamedEntityExtractor> {
        let num_threads = usize::try_from(num_threads).unwrap_or(0).max(1);
        let beta = if beta > 0.0 { beta } else { 0.0 };

        if self.instances.is_empty() {
            return Err(NerError::TrainingFailure("nenhuma instância de treino".into()));
        }
        let categories = self.categories();
        if categories.is_empty() {
            return Err(NerError::TrainingFailure("nenhuma entidade anotada".into()));
        }

        info!(
            instances = self.instances.len(),
            categories = categories.len(),
            num_threads,
            beta,
            "iniciando treino NER"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| NerError::TrainingFailure(format!("pool de threads: {e}")))?;

        let model = pool.install(|| {
            let prepared = self.prepare(&categories);
            let mut model = self.fit(&prepared, categories);
            let offset = tune_outside_bias(&model, &prepared, beta);
            model.set_outside_bias(offset);
            model
        });

        model
            .validate()
            .map_err(|e| NerError::TrainingFailure(format!("divergência numérica: {e}")))?;

        info!(outside_bias = model.outside_bias(), "treino NER concluído");
        Ok(NamedEntityExtractor::new(model, self.feature_extractor.clone()))
    }

    /// Categorias na ordem da primeira ocorrência.
    fn categories(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.instances
            .iter()
            .flat_map(|inst| inst.annotations())
            .filter(|a| seen.insert(a.label.as_str()))
            .map(|a| a.label.clone())
            .collect()
    }

    fn prepare(&self, categories: &[String]) -> Vec<Prepared> {
        self.instances
            .par_iter()
            .map(|inst| {
                let words: Vec<&str> = inst.tokens().iter().map(String::as_str).collect();
                let spans: Vec<(usize, usize, usize)> = inst
                    .annotations()
                    .iter()
                    .filter_map(|a| {
                        let cat = categories.iter().position(|c| *c == a.label)?;
                        Some((a.start, a.len, cat))
                    })
                    .collect();
                Prepared {
                    features: self.feature_extractor.token_features(&words),
                    gold: spans_to_labels(words.len(), &spans),
                }
            })
            .collect()
    }

    fn fit(&self, prepared: &[Prepared], categories: Vec<String>) -> ChainModel {
        let mut perceptron = SequencePerceptron::new(categories.len());
        for epoch in 0..self.options.epochs {
            let mut mistakes = 0;
            for p in prepared {
                if perceptron.train_sequence(&p.features, &p.gold) {
                    mistakes += 1;
                }
            }
            debug!(epoch, mistakes, "época concluída");
            if mistakes == 0 {
                break;
            }
        }
        perceptron.finalize(categories)
    }
}

/// Escolhe o `outside_bias` do grid com maior F-beta; empates ficam com o primeiro.
fn tune_outside_bias(model: &ChainModel, prepared: &[Prepared], beta: f64) -> f64 {
    let scores: Vec<f64> = BIAS_GRID
        .par_iter()
        .map(|&offset| f_beta(model, prepared, offset, beta))
        .collect();

    let mut best = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = i;
        }
    }
    debug!(offset = BIAS_GRID[best], f_beta = scores[best], "outside_bias ajustado");
    BIAS_GRID[best]
}

/// F-beta dos trechos exatos `(pos, len, categoria)` decodificados com `offset`.
fn f_beta(model: &ChainModel, prepared: &[Prepared], offset: f64, beta: f64) -> f64 {
    let (mut tp, mut predicted, mut gold) = (0usize, 0usize, 0usize);
    for p in prepared {
        let expected: HashSet<(usize, usize, usize)> = gold_spans(&p.gold).into_iter().collect();
        let found = model.decode_with_bias(&p.features, offset);
        gold += expected.len();
        predicted += found.len();
        tp += found
            .iter()
            .filter(|d| expected.contains(&(d.pos, d.len, d.tag)))
            .count();
    }

    let precision = if predicted == 0 { 0.0 } else { tp as f64 / predicted as f64 };
    let recall = if gold == 0 { 0.0 } else { tp as f64 / gold as f64 };
    let b2 = beta * beta;
    let denominator = b2 * precision + recall;
    if denominator == 0.0 {
        0.0
    } else {
        (1.0 + b2) * precision * recall / denominator
    }
}

fn gold_spans(labels: &[Tag]) -> Vec<(usize, usize, usize)> {
    let zeros = vec![0.0; labels.len()];
    labels_to_detections(labels, &zeros)
        .into_iter()
        .map(|d| (d.pos, d.len, d.tag))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_fe() -> FeatureExtractor {
        FeatureExtractor {
            affix_lengths: vec![],
            ..FeatureExtractor::default()
        }
    }

    fn sample_trainer() -> NerTrainer {
        let mut davis = TrainingInstance::from_text("My name is Davis King and I work for MIT.");
        davis.add_entity(3, 2, "person").unwrap();
        davis.add_entity(9, 1, "org").unwrap();

        let mut brian =
            TrainingInstance::from_text("The other day at work I saw Brian Smith from CMU.");
        brian.add_entity(7, 2, "person").unwrap();
        brian.add_entity(10, 1, "org").unwrap();

        let mut trainer = NerTrainer::with_feature_extractor(training_fe());
        trainer.add_instance(&davis).unwrap();
        trainer.add_instance(&brian).unwrap();
        trainer
    }

    #[test]
    fn test_train_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let fe_path = dir.path().join("fe.json");
        training_fe().save(&fe_path).unwrap();

        let mut trainer = NerTrainer::new(&fe_path).unwrap();
        for inst in &sample_trainer().instances {
            trainer.add_instance(inst).unwrap();
        }
        assert_eq!(trainer.size(), 2);

        let ner = trainer.train(4, 1.0).unwrap();
        assert_eq!(ner.possible_tags(), ["person", "org"]);

        let ents = ner.extract_from_text("I met with John Becker at HBU.", &[]);
        let person = ents.iter().find(|e| e.tag_str == "person").unwrap();
        assert_eq!(person.name, "John Becker");

        let model_path = dir.path().join("ner.json");
        ner.save(&model_path).unwrap();
        let loaded = NamedEntityExtractor::load(&model_path, None).unwrap();
        assert_eq!(
            loaded.extract_from_text("I met with John Becker at HBU.", &[]),
            ents
        );
    }

    #[test]
    fn test_hyperparameter_coercion() {
        let trainer = sample_trainer();
        let coerced = trainer.train(0, -1.0).unwrap();
        let explicit = trainer.train(1, 0.0).unwrap();
        assert_eq!(coerced.model(), explicit.model());

        let many = trainer.train(-7, f64::NAN).unwrap();
        assert_eq!(many.model(), explicit.model());
    }

    #[test]
    fn test_thread_count_does_not_change_model() {
        let trainer = sample_trainer();
        let one = trainer.train(1, 1.0).unwrap();
        let four = trainer.train(4, 1.0).unwrap();
        assert_eq!(one.model(), four.model());
    }

    #[test]
    fn test_train_without_instances_fails() {
        let trainer = NerTrainer::with_feature_extractor(FeatureExtractor::default());
        assert!(matches!(
            trainer.train(1, 1.0),
            Err(NerError::TrainingFailure(_))
        ));

        let mut unlabeled = NerTrainer::with_feature_extractor(FeatureExtractor::default());
        unlabeled
            .add_instance(&TrainingInstance::from_text("nothing here"))
            .unwrap();
        assert!(matches!(
            unlabeled.train(1, 1.0),
            Err(NerError::TrainingFailure(_))
        ));
    }

    #[test]
    fn test_missing_feature_extractor() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NerTrainer::new(dir.path().join("missing.json")),
            Err(NerError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_add_instance_rejections() {
        let mut trainer = NerTrainer::with_feature_extractor(FeatureExtractor::default());

        let empty = TrainingInstance::new::<&str>(&[]);
        assert!(matches!(
            trainer.add_instance(&empty),
            Err(NerError::RejectedInstance(_))
        ));

        let mut past_end = TrainingInstance::new(&["a", "b"]);
        past_end.add_entity(1, 2, "x").unwrap();
        let mut zero_len = TrainingInstance::new(&["a", "b"]);
        zero_len.add_entity(0, 0, "x").unwrap();
        let mut overlap = TrainingInstance::new(&["a", "b", "c"]);
        overlap.add_entity(0, 2, "x").unwrap();
        overlap.add_entity(1, 2, "y").unwrap();
        let mut no_label = TrainingInstance::new(&["a"]);
        no_label.add_entity(0, 1, "").unwrap();

        for bad in [&past_end, &zero_len, &overlap, &no_label] {
            assert!(matches!(
                trainer.add_instance(bad),
                Err(NerError::RejectedInstance(_))
            ));
        }
        assert_eq!(trainer.size(), 0);

        let mut huge = TrainingInstance::new(&["a", "b"]);
        huge.add_entity(1, usize::MAX, "x").unwrap();
        assert!(matches!(
            trainer.add_instance(&huge),
            Err(NerError::RejectedInstance(_))
        ));
        let mut huge_after_valid = TrainingInstance::new(&["a", "b", "c"]);
        huge_after_valid.add_entity(0, 1, "x").unwrap();
        huge_after_valid.add_entity(2, usize::MAX - 1, "x").unwrap();
        assert!(matches!(
            trainer.add_instance(&huge_after_valid),
            Err(NerError::RejectedInstance(_))
        ));
        assert_eq!(trainer.size(), 0);

        // o treinador continua aceitando instâncias válidas
        let mut ok = TrainingInstance::new(&["a", "b"]);
        ok.add_entity(0, 1, "x").unwrap();
        trainer.add_instance(&ok).unwrap();
        assert_eq!(trainer.size(), 1);
    }

    #[test]
    fn test_instance_is_copied() {
        let mut inst = TrainingInstance::new(&["Ana", "mora", "aqui"]);
        inst.add_entity(0, 1, "person").unwrap();
        let mut trainer = NerTrainer::with_feature_extractor(FeatureExtractor::default());
        trainer.add_instance(&inst).unwrap();

        inst.add_entity(2, 1, "place").unwrap();
        assert_eq!(trainer.instances[0].num_entities(), 1);
        assert_eq!(inst.num_entities(), 2);
    }

    #[test]
    fn test_options_are_serde_defaulted() {
        let options: TrainerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, TrainerOptions::default());
        let trainer = sample_trainer().with_options(TrainerOptions { epochs: 1 });
        assert!(trainer.train(1, 1.0).is_ok());
    }
}
