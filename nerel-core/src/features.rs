//! # Engenharia de Features
//!
//! O [`FeatureExtractor`] é o "modelo extrator de features": uma configuração
//! serializável que decide quais features binárias cada token ativa. Ele é salvo em
//! arquivo próprio e exigido pelo [`NerTrainer`](crate::trainer::NerTrainer).
//!
//! ## Features de token
//! - Forma da palavra (lowercase) e cluster da palavra, se houver dicionário
//! - Shape ortográfico (ex: "Davis" → `Xxx`, "MIT" → `XX`, "2024" → `dd`)
//! - Prefixos e sufixos nos tamanhos configurados
//! - Início/fim de sentença e pontuação
//! - Palavras e shapes vizinhos dentro da janela de contexto
//!
//! ## Features de relação
//! Para um par direcionado de trechos, a palavra de cada argumento, as palavras entre
//! eles combinadas com a direção (`ltr`/`rtl`), a distância e o contexto externo.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{NerError, Result};
use crate::storage::{self, ModelFile, ModelFileRef};

/// Features ativas de um token (ou de um candidato a relação).
///
/// O mapa é ordenado para que o produto escalar some sempre na mesma ordem: a mesma
/// entrada produz exatamente os mesmos scores em qualquer chamada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// O mapa de features ativas. Ex: `{"bias": 1.0, "word=alabama": 1.0}`.
    pub features: BTreeMap<String, f64>,
    /// Índice do token na sentença (ou início do primeiro argumento, para relações).
    pub token_index: usize,
}

impl FeatureVector {
    pub fn new(token_index: usize) -> Self {
        Self {
            features: BTreeMap::new(),
            token_index,
        }
    }

    /// Adiciona uma feature com o valor dado (1.0 para features binárias).
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.features.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.features.contains_key(key)
    }

    /// Produto escalar com um vetor de pesos esparso.
    pub fn dot(&self, weights: &HashMap<String, f64>) -> f64 {
        self.features
            .iter()
            .map(|(k, v)| v * weights.get(k).unwrap_or(&0.0))
            .sum()
    }
}

/// Maior janela de contexto aceita num arquivo de extrator.
pub const MAX_WINDOW: usize = 16;
/// Maior tamanho de prefixo/sufixo aceito num arquivo de extrator.
pub const MAX_AFFIX_LEN: usize = 16;

/// Configuração do extrator de features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureExtractor {
    /// Ativa `word=<lowercase>`.
    pub word: bool,
    /// Ativa `shape=<shape>`.
    pub shape: bool,
    /// Tamanhos de prefixo/sufixo (em caracteres).
    pub affix_lengths: Vec<usize>,
    /// Quantos tokens de cada lado entram como contexto.
    pub window: usize,
    /// Ativa o shape dos tokens vizinhos.
    pub context_shape: bool,
    /// Dicionário palavra (lowercase) → id do cluster.
    pub clusters: BTreeMap<String, String>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            word: true,
            shape: true,
            affix_lengths: vec![2, 3],
            window: 1,
            context_shape: true,
            clusters: BTreeMap::new(),
        }
    }
}

impl FeatureExtractor {
    /// Carrega um extrator de features salvo com [`FeatureExtractor::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match storage::read(path)? {
            ModelFile::FeatureExtractor { extractor, .. } => {
                extractor.validate().map_err(|e| NerError::load(path, e))?;
                Ok(extractor)
            }
            other => Err(NerError::load(
                path,
                format!("esperado feature_extractor, encontrado {}", other.kind_name()),
            )),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        storage::write(path.as_ref(), &ModelFileRef::feature_extractor(self))
    }

    /// Confere os limites da configuração após desserializar.
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.window > MAX_WINDOW {
            return Err(format!("janela {} acima do máximo {MAX_WINDOW}", self.window));
        }
        if let Some(n) = self.affix_lengths.iter().find(|&&n| n > MAX_AFFIX_LEN) {
            return Err(format!("afixo de tamanho {n} acima do máximo {MAX_AFFIX_LEN}"));
        }
        Ok(())
    }

    /// Identificador estável da configuração (SHA-256 do JSON canônico).
    ///
    /// Modelos puros e detectores de relação guardam este valor para recusar
    /// features calculadas por outro extrator.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        Sha256::digest(&canonical)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Gera um [`FeatureVector`] por token, alinhado com a entrada.
    pub fn token_features(&self, tokens: &[&str]) -> Vec<FeatureVector> {
        (0..tokens.len())
            .map(|i| self.extract_for_token(tokens, i))
            .collect()
    }

    /// Extrai as features de um único token em seu contexto.
    pub fn extract_for_token(&self, tokens: &[&str], i: usize) -> FeatureVector {
        let mut fv = FeatureVector::new(i);
        let word = tokens[i];
        let lower = word.to_lowercase();

        fv.insert("bias", 1.0);
        if self.word {
            fv.insert(format!("word={lower}"), 1.0);
        }
        if let Some(cluster) = self.clusters.get(&lower) {
            fv.insert(format!("cluster={cluster}"), 1.0);
        }
        if self.shape {
            fv.insert(format!("shape={}", word_shape(word)), 1.0);
        }

        let chars: Vec<char> = lower.chars().collect();
        for &n in &self.affix_lengths {
            if n > 0 && chars.len() >= n {
                let prefix: String = chars[..n].iter().collect();
                let suffix: String = chars[chars.len() - n..].iter().collect();
                fv.insert(format!("prefix{n}={prefix}"), 1.0);
                fv.insert(format!("suffix{n}={suffix}"), 1.0);
            }
        }

        if !word.is_empty() && word.chars().all(|c| !c.is_alphanumeric()) {
            fv.insert("is_punctuation", 1.0);
        }
        if i == 0 {
            fv.insert("BOS", 1.0);
        }
        if i + 1 == tokens.len() {
            fv.insert("EOS", 1.0);
        }

        // além do tamanho da sentença não há vizinhos
        for d in 1..=self.window.min(tokens.len()) {
            let suffix = if d == 1 { String::new() } else { d.to_string() };
            if let Some(prev) = i.checked_sub(d).map(|j| tokens[j]) {
                fv.insert(format!("prev{suffix}_word={}", prev.to_lowercase()), 1.0);
                if self.context_shape {
                    fv.insert(format!("prev{suffix}_shape={}", word_shape(prev)), 1.0);
                }
            }
            if let Some(next) = tokens.get(i + d) {
                fv.insert(format!("next{suffix}_word={}", next.to_lowercase()), 1.0);
                if self.context_shape {
                    fv.insert(format!("next{suffix}_shape={}", word_shape(next)), 1.0);
                }
            }
        }

        fv
    }

    /// Features de um candidato a relação `arg1 → arg2`.
    ///
    /// Os trechos precisam ser válidos (não vazios, dentro de `tokens`, sem sobreposição);
    /// quem valida é [`NamedEntityExtractor::extract_binary_relation`](crate::ner::NamedEntityExtractor::extract_binary_relation).
    pub fn relation_features(
        &self,
        tokens: &[&str],
        arg1: &Range<usize>,
        arg2: &Range<usize>,
    ) -> FeatureVector {
        let mut fv = FeatureVector::new(arg1.start);
        let dir = if arg1.start < arg2.start { "ltr" } else { "rtl" };
        let (left, right) = if arg1.start < arg2.start {
            (arg1, arg2)
        } else {
            (arg2, arg1)
        };

        fv.insert("bias", 1.0);
        fv.insert(format!("dir={dir}"), 1.0);
        for (role, span) in [("arg1", arg1), ("arg2", arg2)] {
            for &tok in &tokens[span.clone()] {
                fv.insert(format!("{role}_word={}", tok.to_lowercase()), 1.0);
            }
            fv.insert(format!("{role}_shape={}", word_shape(tokens[span.start])), 1.0);
            fv.insert(format!("{role}_len={}", span.len().min(4)), 1.0);
        }

        let between = &tokens[left.end..right.start];
        for &tok in between {
            fv.insert(format!("{dir}_between={}", tok.to_lowercase()), 1.0);
        }
        let distance = match between.len() {
            0 => "0",
            1 => "1",
            2 => "2",
            3..=5 => "3-5",
            _ => "6+",
        };
        fv.insert(format!("between_count={distance}"), 1.0);

        if let Some(before) = left.start.checked_sub(1).map(|j| tokens[j]) {
            fv.insert(format!("before_left={}", before.to_lowercase()), 1.0);
        }
        if let Some(after) = tokens.get(right.end) {
            fv.insert(format!("after_right={}", after.to_lowercase()), 1.0);
        }

        fv
    }
}

/// Shape ortográfico: maiúscula → `X`, minúscula → `x`, dígito → `d`, demais caracteres
/// mantidos; sequências com mais de dois caracteres iguais são encurtadas para dois.
pub fn word_shape(word: &str) -> String {
    let mut shape = String::new();
    let mut last: Option<char> = None;
    let mut run = 0;
    for c in word.chars() {
        let s = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if Some(s) == last {
            run += 1;
        } else {
            last = Some(s);
            run = 1;
        }
        if run <= 2 {
            shape.push(s);
        }
    }
    shape
}
