//! # Pareamento de Relações
//!
//! Dada a lista ordenada de entidades, só pares **vizinhos** `(E[i], E[i+1])` são
//! comparados. Para cada par são montados dois candidatos, `E[i] → E[i+1]` e
//! `E[i+1] → E[i]`, e cada detector pontua os dois. Quando o score é `> 0`, a relação
//! entra na lista da entidade de origem, na ordem em que os detectores foram passados.
//!
//! Falhas ao montar ou classificar um candidato valem como "nenhuma relação".

use tracing::{debug, warn};

use crate::entity::{Entity, Relationship};
use crate::ner::NamedEntityExtractor;
use crate::relation::{BinaryRelation, RelationDetector};

/// Anexa as relações encontradas às entidades, in-place.
pub fn attach_relationships<S: AsRef<str>>(
    ner: &NamedEntityExtractor,
    tokens: &[S],
    entities: &mut [Entity],
    detectors: &[&RelationDetector],
) {
    for i in 0..entities.len().saturating_sub(1) {
        let (a, b) = (&entities[i], &entities[i + 1]);
        let forward = candidate(ner, tokens, a, b);
        let reverse = candidate(ner, tokens, b, a);
        let (a_copy, b_copy) = (a.detached(), b.detached());

        for rd in detectors {
            if let Some(score) = forward.as_ref().and_then(|rel| score(rd, rel)) {
                entities[i].relationships.push(Relationship {
                    name: rd.name().to_string(),
                    other: b_copy.clone(),
                    score,
                });
            }
            if let Some(score) = reverse.as_ref().and_then(|rel| score(rd, rel)) {
                entities[i + 1].relationships.push(Relationship {
                    name: rd.name().to_string(),
                    other: a_copy.clone(),
                    score,
                });
            }
        }
    }
    debug!(
        entities = entities.len(),
        detectors = detectors.len(),
        "pareamento de relações concluído"
    );
}

fn candidate<S: AsRef<str>>(
    ner: &NamedEntityExtractor,
    tokens: &[S],
    source: &Entity,
    target: &Entity,
) -> Option<BinaryRelation> {
    ner.extract_binary_relation(tokens, source.pos..source.end(), target.pos..target.end())
        .map_err(|e| warn!(error = %e, "candidato a relação descartado"))
        .ok()
}

/// Score positivo do detector, ou `None` para "nenhuma relação".
fn score(rd: &RelationDetector, rel: &BinaryRelation) -> Option<f64> {
    match rd.classify(rel) {
        Ok(score) if score > 0.0 => Some(score),
        Ok(_) => None,
        Err(e) => {
            warn!(detector = rd.name(), error = %e, "classificação de relação falhou");
            None
        }
    }
}
