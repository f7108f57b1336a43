//! # Arquivos de Modelo
//!
//! Todo modelo persistido é um documento JSON com um envelope comum:
//!
//! ```text
//! { "kind": "ner_full", "format_version": 1, ... }
//! ```
//!
//! | `kind`               | Conteúdo                                               |
//! |----------------------|--------------------------------------------------------|
//! | `ner_pure`           | modelo de sequência + fingerprint do extrator usado     |
//! | `ner_full`           | modelo de sequência + extrator de features embutido     |
//! | `relation_detector`  | classificador binário de uma relação                    |
//! | `feature_extractor`  | configuração do extrator de features                    |
//!
//! Erros de leitura viram [`NerError::LoadFailure`]; erros de escrita viram
//! [`NerError::SaveFailure`].

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::ChainModel;
use crate::error::{NerError, Result};
use crate::features::FeatureExtractor;
use crate::relation::RelationDetector;

/// Versão atual do formato em disco.
pub const FORMAT_VERSION: u32 = 1;

/// Como um arquivo de modelo NER deve ser carregado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerModelKind {
    /// Modelo que não embute o extrator de features.
    Pure,
    /// Modelo autocontido, com o extrator de features embutido.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FileKind {
    NerPure,
    NerFull,
    RelationDetector,
    FeatureExtractor,
}

#[derive(Deserialize)]
struct Header {
    kind: FileKind,
    format_version: u32,
}

/// Conteúdo lido de um arquivo de modelo.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ModelFile {
    NerPure {
        format_version: u32,
        model: ChainModel,
        feature_extractor: String,
    },
    NerFull {
        format_version: u32,
        model: ChainModel,
        feature_extractor: FeatureExtractor,
    },
    RelationDetector {
        format_version: u32,
        detector: RelationDetector,
    },
    FeatureExtractor {
        format_version: u32,
        extractor: FeatureExtractor,
    },
}

impl ModelFile {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            ModelFile::NerPure { .. } => "ner_pure",
            ModelFile::NerFull { .. } => "ner_full",
            ModelFile::RelationDetector { .. } => "relation_detector",
            ModelFile::FeatureExtractor { .. } => "feature_extractor",
        }
    }

    fn format_version(&self) -> u32 {
        match self {
            ModelFile::NerPure { format_version, .. }
            | ModelFile::NerFull { format_version, .. }
            | ModelFile::RelationDetector { format_version, .. }
            | ModelFile::FeatureExtractor { format_version, .. } => *format_version,
        }
    }
}

/// Versão emprestada de [`ModelFile`], usada na escrita.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ModelFileRef<'a> {
    NerPure {
        format_version: u32,
        model: &'a ChainModel,
        feature_extractor: String,
    },
    NerFull {
        format_version: u32,
        model: &'a ChainModel,
        feature_extractor: &'a FeatureExtractor,
    },
    RelationDetector {
        format_version: u32,
        detector: &'a RelationDetector,
    },
    FeatureExtractor {
        format_version: u32,
        extractor: &'a FeatureExtractor,
    },
}

impl<'a> ModelFileRef<'a> {
    pub(crate) fn ner_pure(model: &'a ChainModel, fingerprint: String) -> Self {
        ModelFileRef::NerPure {
            format_version: FORMAT_VERSION,
            model,
            feature_extractor: fingerprint,
        }
    }

    pub(crate) fn ner_full(model: &'a ChainModel, extractor: &'a FeatureExtractor) -> Self {
        ModelFileRef::NerFull {
            format_version: FORMAT_VERSION,
            model,
            feature_extractor: extractor,
        }
    }

    pub(crate) fn relation_detector(detector: &'a RelationDetector) -> Self {
        ModelFileRef::RelationDetector {
            format_version: FORMAT_VERSION,
            detector,
        }
    }

    pub(crate) fn feature_extractor(extractor: &'a FeatureExtractor) -> Self {
        ModelFileRef::FeatureExtractor {
            format_version: FORMAT_VERSION,
            extractor,
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| NerError::load(path, e))
}

fn check_version(path: &Path, version: u32) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(NerError::load(
            path,
            format!("versão de formato {version} não suportada"),
        ));
    }
    Ok(())
}

/// Classifica um arquivo de modelo NER como puro ou completo, lendo só o envelope.
///
/// Arquivos de outro tipo (detector de relação, extrator de features) falham com
/// [`NerError::LoadFailure`].
pub fn classify_ner_model(path: impl AsRef<Path>) -> Result<NerModelKind> {
    let path = path.as_ref();
    let header: Header =
        serde_json::from_reader(open(path)?).map_err(|e| NerError::load(path, e))?;
    check_version(path, header.format_version)?;
    match header.kind {
        FileKind::NerPure => Ok(NerModelKind::Pure),
        FileKind::NerFull => Ok(NerModelKind::Full),
        other => Err(NerError::load(
            path,
            format!("não é um modelo NER ({other:?})"),
        )),
    }
}

pub(crate) fn read(path: &Path) -> Result<ModelFile> {
    let file: ModelFile =
        serde_json::from_reader(open(path)?).map_err(|e| NerError::load(path, e))?;
    check_version(path, file.format_version())?;
    debug!(path = %path.display(), kind = file.kind_name(), "arquivo de modelo lido");
    Ok(file)
}

pub(crate) fn write(path: &Path, file: &ModelFileRef<'_>) -> Result<()> {
    let out = File::create(path).map_err(|e| NerError::save(path, e))?;
    let mut writer = BufWriter::new(out);
    serde_json::to_writer(&mut writer, file).map_err(|e| NerError::save(path, e))?;
    writer.flush().map_err(|e| NerError::save(path, e))?;
    debug!(path = %path.display(), "arquivo de modelo salvo");
    Ok(())
}
