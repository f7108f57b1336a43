//! # Extrator de Entidades Nomeadas
//!
//! O [`NamedEntityExtractor`] é o handle de um modelo NER carregado de arquivo (ou
//! recém-treinado). Ele é dono exclusivo do modelo: não é `Clone`, e
//! [`close`](NamedEntityExtractor::close) consome o handle, então usar um modelo já
//! liberado não compila.
//!
//! ## Carga em dois passos
//!
//! 1. [`classify_ner_model`] lê o envelope do arquivo: [`NerModelKind::Pure`] ou
//!    [`NerModelKind::Full`].
//! 2. A carga despacha pelo tipo:
//!    - puro, sem extrator de features → usa o extrator padrão;
//!    - puro, com extrator de features → usa o arquivo de extrator informado;
//!    - completo → usa o extrator embutido, ignorando o argumento.
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use nerel_core::{NamedEntityExtractor, RelationDetector};
//!
//! let ner = NamedEntityExtractor::load("ner_model.json", None)?;
//! let rd = RelationDetector::load("place_of_birth.json")?;
//!
//! for entity in ner.extract_from_text("John Smith was born in Huntsville, Alabama.", &[&rd]) {
//!     println!("{} ({}) {:.2}", entity.name, entity.tag_str, entity.score);
//!     for rel in &entity.relationships {
//!         println!("  {} -> {}", rel.name, rel.other.name);
//!     }
//! }
//! # Ok::<(), nerel_core::NerError>(())
//! ```

use std::ops::Range;
use std::path::Path;

use tracing::{debug, trace};

use crate::chain::ChainModel;
use crate::entity::Entity;
use crate::error::{NerError, Result};
use crate::features::FeatureExtractor;
use crate::pairing::attach_relationships;
use crate::relation::{BinaryRelation, RelationDetector};
use crate::storage::{self, classify_ner_model, ModelFile, ModelFileRef, NerModelKind};
use crate::tagger::Detection;
use crate::tokenizer::tokenize;

/// Handle de um modelo NER carregado.
#[derive(Debug)]
pub struct NamedEntityExtractor {
    model: ChainModel,
    feature_extractor: FeatureExtractor,
    fingerprint: String,
}

impl NamedEntityExtractor {
    /// Monta um extrator a partir de um modelo em memória.
    pub fn new(model: ChainModel, feature_extractor: FeatureExtractor) -> Self {
        let fingerprint = feature_extractor.fingerprint();
        Self {
            model,
            feature_extractor,
            fingerprint,
        }
    }

    /// Carrega um modelo NER, opcionalmente com um extrator de features separado.
    ///
    /// O extrator só é usado por modelos puros; modelos completos trazem o próprio.
    pub fn load(path: impl AsRef<Path>, feature_extractor: Option<&Path>) -> Result<Self> {
        let path = path.as_ref();
        let ner = match (classify_ner_model(path)?, feature_extractor) {
            (NerModelKind::Pure, None) => Self::load_pure(path, None)?,
            (NerModelKind::Pure, Some(fe_path)) => {
                Self::load_pure(path, Some(FeatureExtractor::load(fe_path)?))?
            }
            (NerModelKind::Full, _) => Self::load_full(path)?,
        };
        debug!(
            path = %path.display(),
            tags = ner.model.categories().len(),
            "modelo NER carregado"
        );
        Ok(ner)
    }

    fn load_pure(path: &Path, feature_extractor: Option<FeatureExtractor>) -> Result<Self> {
        let ModelFile::NerPure {
            model,
            feature_extractor: expected,
            ..
        } = storage::read(path)?
        else {
            return Err(NerError::load(path, "esperado modelo puro"));
        };
        let supplied = feature_extractor.is_some();
        let fe = feature_extractor.unwrap_or_default();
        if fe.fingerprint() != expected {
            let reason = if supplied {
                "extrator de features não corresponde ao usado no treino"
            } else {
                "modelo exige o extrator de features com que foi treinado"
            };
            return Err(NerError::load(path, reason));
        }
        model.validate().map_err(|e| NerError::load(path, e))?;
        Ok(Self::new(model, fe))
    }

    fn load_full(path: &Path) -> Result<Self> {
        let ModelFile::NerFull {
            model,
            feature_extractor,
            ..
        } = storage::read(path)?
        else {
            return Err(NerError::load(path, "esperado modelo completo"));
        };
        model.validate().map_err(|e| NerError::load(path, e))?;
        feature_extractor
            .validate()
            .map_err(|e| NerError::load(path, e))?;
        Ok(Self::new(model, feature_extractor))
    }

    /// Salva o modelo completo (com o extrator de features embutido).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        storage::write(
            path.as_ref(),
            &ModelFileRef::ner_full(&self.model, &self.feature_extractor),
        )
    }

    /// Salva só o modelo, guardando a identificação do extrator de features.
    pub fn save_pure(&self, path: impl AsRef<Path>) -> Result<()> {
        storage::write(
            path.as_ref(),
            &ModelFileRef::ner_pure(&self.model, self.fingerprint.clone()),
        )
    }

    /// Tabela de tags do modelo; o índice é o id da tag.
    pub fn possible_tags(&self) -> &[String] {
        self.model.categories()
    }

    pub fn feature_extractor(&self) -> &FeatureExtractor {
        &self.feature_extractor
    }

    pub(crate) fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn model(&self) -> &ChainModel {
        &self.model
    }

    /// Detecções brutas `(tag, pos, len, score)`, ordenadas por posição e sem sobreposição.
    pub fn detect<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Detection> {
        let words: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        let fvs = self.feature_extractor.token_features(&words);
        self.model.decode(&fvs)
    }

    /// Extrai entidades de uma sequência de tokens.
    ///
    /// Com detectores de relação, entidades vizinhas são pareadas e as relações com
    /// score positivo são anexadas à entidade de origem.
    pub fn extract<S: AsRef<str>>(
        &self,
        tokens: &[S],
        detectors: &[&RelationDetector],
    ) -> Vec<Entity> {
        let tags = self.possible_tags();
        let mut entities: Vec<Entity> = self
            .detect(tokens)
            .into_iter()
            .map(|d| Entity {
                name: tokens[d.pos..d.pos + d.len]
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>()
                    .join(" "),
                pos: d.pos,
                len: d.len,
                tag: d.tag,
                tag_str: tags[d.tag].clone(),
                score: d.score,
                relationships: Vec::new(),
            })
            .collect();

        if !detectors.is_empty() {
            attach_relationships(self, tokens, &mut entities, detectors);
        }
        entities
    }

    /// Equivale a `extract(&tokenize(text), detectors)`.
    pub fn extract_from_text(&self, text: &str, detectors: &[&RelationDetector]) -> Vec<Entity> {
        self.extract(&tokenize(text), detectors)
    }

    /// Monta o candidato a relação `arg1 → arg2` sobre os tokens.
    ///
    /// Falha com [`NerError::Classification`] se algum trecho for vazio, passar do fim
    /// dos tokens ou se os dois se sobrepuserem.
    pub fn extract_binary_relation<S: AsRef<str>>(
        &self,
        tokens: &[S],
        arg1: Range<usize>,
        arg2: Range<usize>,
    ) -> Result<BinaryRelation> {
        let n = tokens.len();
        for arg in [&arg1, &arg2] {
            if arg.is_empty() || arg.end > n {
                return Err(NerError::Classification(format!(
                    "trecho {arg:?} inválido para {n} tokens"
                )));
            }
        }
        if arg1.start < arg2.end && arg2.start < arg1.end {
            return Err(NerError::Classification(format!(
                "trechos {arg1:?} e {arg2:?} se sobrepõem"
            )));
        }
        let words: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        let features = self.feature_extractor.relation_features(&words, &arg1, &arg2);
        Ok(BinaryRelation {
            arg1,
            arg2,
            features,
            feature_extractor: self.fingerprint.clone(),
        })
    }

    /// Libera o modelo.
    pub fn close(self) {}
}

impl Drop for NamedEntityExtractor {
    fn drop(&mut self) {
        trace!(tags = self.model.categories().len(), "modelo NER liberado");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tagger::Tag;
    use crate::tokenizer::tokenize;

    pub(crate) const TEXT: &str = "John Smith was born in Huntsville, Alabama.";

    /// Modelo com pesos fixos: reconhece John Smith (PERSON) e Huntsville/Alabama (LOCATION).
    pub(crate) fn sample_extractor() -> NamedEntityExtractor {
        let mut model = ChainModel::new(vec!["PERSON".into(), "LOCATION".into()]);
        model.set_outside_bias(1.0);
        model.set_emission("word=john", Tag::Begin(0), 3.0);
        model.set_emission("word=smith", Tag::Inside(0), 3.0);
        model.set_emission("word=huntsville", Tag::Begin(1), 3.0);
        model.set_emission("word=alabama", Tag::Begin(1), 2.5);
        NamedEntityExtractor::new(model, FeatureExtractor::default())
    }

    #[test]
    fn test_extract_entities() {
        let ner = sample_extractor();
        let ents = ner.extract(&tokenize(TEXT), &[]);

        assert_eq!(ents.len(), 3);
        assert_eq!(ents[0].name, "John Smith");
        assert_eq!(ents[0].tag_str, "PERSON");
        assert_eq!((ents[0].pos, ents[0].len), (0, 2));
        assert_eq!(ents[1].name, "Huntsville");
        assert_eq!(ents[2].name, "Alabama");
        assert_eq!(ents[2].tag, 1);
        assert!(ents.iter().all(|e| e.relationships.is_empty()));
        assert!(ents.windows(2).all(|w| w[0].end() <= w[1].pos));
    }

    #[test]
    fn test_extract_from_text_matches_tokens() {
        let ner = sample_extractor();
        assert_eq!(
            ner.extract_from_text(TEXT, &[]),
            ner.extract(&tokenize(TEXT), &[])
        );
    }

    #[test]
    fn test_extract_empty_inputs() {
        let ner = sample_extractor();
        assert!(ner.extract_from_text("", &[]).is_empty());
        assert!(ner.extract_from_text("nothing to see here", &[]).is_empty());
        assert!(ner.extract::<&str>(&[], &[]).is_empty());
    }

    #[test]
    fn test_possible_tags_index_matches_tag() {
        let ner = sample_extractor();
        for e in ner.extract_from_text(TEXT, &[]) {
            assert_eq!(ner.possible_tags()[e.tag], e.tag_str);
        }
    }

    #[test]
    fn test_save_full_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ner.json");
        let ner = sample_extractor();
        ner.save(&path).unwrap();

        assert_eq!(classify_ner_model(&path).unwrap(), NerModelKind::Full);
        let fe_path = dir.path().join("other_fe.json");
        FeatureExtractor { window: 2, ..FeatureExtractor::default() }
            .save(&fe_path)
            .unwrap();
        // modelo completo ignora o extrator informado
        let loaded = NamedEntityExtractor::load(&path, Some(fe_path.as_path())).unwrap();
        assert_eq!(loaded.possible_tags(), ner.possible_tags());
        assert_eq!(
            loaded.extract_from_text(TEXT, &[]),
            ner.extract_from_text(TEXT, &[])
        );
    }

    #[test]
    fn test_pure_model_without_feature_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pure.json");
        let ner = sample_extractor();
        ner.save_pure(&path).unwrap();

        assert_eq!(classify_ner_model(&path).unwrap(), NerModelKind::Pure);
        let loaded = NamedEntityExtractor::load(&path, None).unwrap();
        assert_eq!(
            loaded.extract_from_text(TEXT, &[]),
            ner.extract_from_text(TEXT, &[])
        );
    }

    #[test]
    fn test_pure_model_with_feature_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let fe = FeatureExtractor { affix_lengths: vec![], ..FeatureExtractor::default() };
        let fe_path = dir.path().join("fe.json");
        fe.save(&fe_path).unwrap();

        let mut model = ChainModel::new(vec!["PERSON".into()]);
        model.set_emission("word=john", Tag::Begin(0), 1.0);
        let path = dir.path().join("pure.json");
        NamedEntityExtractor::new(model, fe.clone()).save_pure(&path).unwrap();

        let loaded = NamedEntityExtractor::load(&path, Some(fe_path.as_path())).unwrap();
        assert_eq!(loaded.feature_extractor(), &fe);
        assert_eq!(loaded.extract_from_text("John", &[]).len(), 1);

        // sem o extrator certo a carga falha em vez de gerar features erradas
        assert!(matches!(
            NamedEntityExtractor::load(&path, None),
            Err(NerError::LoadFailure { .. })
        ));
        let wrong = dir.path().join("wrong_fe.json");
        FeatureExtractor::default().save(&wrong).unwrap();
        assert!(matches!(
            NamedEntityExtractor::load(&path, Some(wrong.as_path())),
            Err(NerError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_load_failures() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NamedEntityExtractor::load(dir.path().join("missing.json"), None),
            Err(NerError::LoadFailure { .. })
        ));

        let rd_path = dir.path().join("rd.json");
        RelationDetector::new("people.person.place_of_birth")
            .save(&rd_path)
            .unwrap();
        assert!(matches!(
            NamedEntityExtractor::load(&rd_path, None),
            Err(NerError::LoadFailure { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(
            &bad,
            r#"{"kind":"ner_full","format_version":1,"model":{"categories":["A"],
                "emissions":{},"transitions":[[0.0]],"outside_bias":0.0},
                "feature_extractor":{}}"#,
        )
        .unwrap();
        assert!(matches!(
            NamedEntityExtractor::load(&bad, None),
            Err(NerError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_full_model_with_out_of_range_extractor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.json");
        std::fs::write(
            &path,
            r#"{"kind":"ner_full","format_version":1,"model":{"categories":["A"],
                "emissions":{},"transitions":[[0.0,0.0,0.0],[0.0,0.0,0.0],[0.0,0.0,0.0]],
                "outside_bias":0.0},"feature_extractor":{"window":1000}}"#,
        )
        .unwrap();
        assert!(matches!(
            NamedEntityExtractor::load(&path, None),
            Err(NerError::LoadFailure { .. })
        ));
    }

    #[test]
    fn test_save_failure_keeps_handle_usable() {
        let dir = tempfile::tempdir().unwrap();
        let ner = sample_extractor();
        let err = ner.save(dir.path().join("no").join("such").join("dir.json"));
        assert!(matches!(err, Err(NerError::SaveFailure { .. })));
        assert_eq!(ner.extract_from_text(TEXT, &[]).len(), 3);
    }

    #[test]
    fn test_extract_binary_relation_validation() {
        let ner = sample_extractor();
        let tokens = tokenize(TEXT);
        assert!(ner.extract_binary_relation(&tokens, 0..2, 5..6).is_ok());
        assert!(ner.extract_binary_relation(&tokens, 0..2, 1..3).is_err());
        assert!(ner.extract_binary_relation(&tokens, 0..0, 5..6).is_err());
        assert!(ner.extract_binary_relation(&tokens, 0..2, 8..10).is_err());
    }

    #[test]
    fn test_extractor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NamedEntityExtractor>();
    }
}
