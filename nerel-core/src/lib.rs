//! # nerel-core — Entidades Nomeadas e Relações Binárias
//!
//! Este crate reconhece entidades nomeadas (pessoas, organizações, lugares...) em texto
//! bruto ou já tokenizado e, opcionalmente, liga entidades vizinhas por relações
//! direcionais com nome (ex: `people.person.place_of_birth`). Também treina modelos
//! novos a partir de exemplos anotados.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Entrada**: Texto bruto ou sequência de tokens.
//! 2.  **Tokenização** ([`tokenizer`]): fronteiras de palavra Unicode, com offsets em bytes.
//! 3.  **Extração de Features** ([`features`]): cada token vira um vetor esparso de features.
//! 4.  **Decodificação** ([`chain`], [`viterbi`]): modelo linear-chain com rótulos BIO ([`tagger`]).
//! 5.  **Entidades** ([`ner`]): trechos com tag e score, ordenados e sem sobreposição.
//! 6.  **Relações** ([`pairing`], [`relation`]): cada par de entidades vizinhas é
//!     pontuado nos dois sentidos por cada detector; só scores positivos ficam.
//!
//! O treino ([`training`], [`trainer`]) usa um perceptron estruturado médio
//! ([`perceptron`]) e grava os modelos como JSON ([`storage`]).
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use nerel_core::{FeatureExtractor, NerTrainer, TrainingInstance};
//!
//! let mut sample = TrainingInstance::from_text("My name is Davis King and I work for MIT.");
//! sample.add_entity(3, 2, "person")?;
//! sample.add_entity(9, 1, "org")?;
//!
//! let mut trainer = NerTrainer::with_feature_extractor(FeatureExtractor::default());
//! trainer.add_instance(&sample)?;
//! let ner = trainer.train(2, 1.0)?;
//!
//! for entity in ner.extract_from_text("My name is Davis King and I work for MIT.", &[]) {
//!     println!("{} ({}) {:.2}", entity.name, entity.tag_str, entity.score);
//! }
//! # Ok::<(), nerel_core::NerError>(())
//! ```

pub mod chain;
pub mod entity;
pub mod error;
pub mod features;
pub mod ner;
pub mod pairing;
pub mod perceptron;
pub mod relation;
pub mod storage;
pub mod tagger;
pub mod tokenizer;
pub mod trainer;
pub mod training;
pub mod viterbi;

pub use entity::{Entity, Relationship};
pub use error::{NerError, Result};
pub use features::FeatureExtractor;
pub use ner::NamedEntityExtractor;
pub use relation::{BinaryRelation, RelationDetector, RelationTrainer};
pub use storage::{classify_ner_model, NerModelKind};
pub use tokenizer::{tokenize, tokenize_with_offsets, Token};
pub use trainer::{NerTrainer, TrainerOptions};
pub use training::{Annotation, TrainingInstance};
