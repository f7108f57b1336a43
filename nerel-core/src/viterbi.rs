//! # Algoritmo de Viterbi
//!
//! Programação dinâmica que encontra a sequência de rótulos de maior score em
//! `O(N × T²)` em vez de `O(T^N)`.
//!
//! ```text
//! Inicialização: viterbi[0][t] = emission[0][t]                   (t pode abrir a sentença)
//! Recursão:      viterbi[i][t] = max_{t'} [viterbi[i-1][t'] + transition[t'][t]] + emission[i][t]
//! Backtracking:  reconstrói o caminho ótimo de trás pra frente
//! ```
//!
//! Transições inválidas no esquema BIO (ex: `O → I-X`) são proibidas, não apenas
//! penalizadas, então todo caminho devolvido forma trechos bem formados. Empates
//! ficam com o rótulo de menor índice.

use crate::tagger::Tag;

/// Decodifica a melhor sequência de rótulos.
///
/// `emission[i][t]` é o score do rótulo de índice `t` no token `i`;
/// `transitions[p][t]` é o score de ir de `p` para `t`.
pub fn viterbi_decode(emission: &[Vec<f64>], transitions: &[Vec<f64>]) -> Vec<Tag> {
    let n_tokens = emission.len();
    if n_tokens == 0 {
        return Vec::new();
    }
    let n_tags = emission[0].len();
    let tags: Vec<Tag> = (0..n_tags).map(Tag::from_index).collect();

    let mut viterbi: Vec<f64> = tags
        .iter()
        .enumerate()
        .map(|(t, tag)| {
            if tag.can_start() {
                emission[0][t]
            } else {
                f64::NEG_INFINITY
            }
        })
        .collect();
    let mut backptr: Vec<Vec<usize>> = vec![vec![0usize; n_tags]; n_tokens];

    for i in 1..n_tokens {
        let mut next = vec![f64::NEG_INFINITY; n_tags];
        for t in 0..n_tags {
            let mut best_prev_score = f64::NEG_INFINITY;
            let mut best_prev_tag = 0;
            for prev_t in 0..n_tags {
                if !Tag::is_valid_transition(tags[prev_t], tags[t]) {
                    continue;
                }
                let score = viterbi[prev_t] + transitions[prev_t][t];
                if score > best_prev_score {
                    best_prev_score = score;
                    best_prev_tag = prev_t;
                }
            }
            next[t] = best_prev_score + emission[i][t];
            backptr[i][t] = best_prev_tag;
        }
        viterbi = next;
    }

    let mut best_last = best_in_slice(&viterbi);
    let mut best_sequence = vec![Tag::Outside; n_tokens];
    best_sequence[n_tokens - 1] = tags[best_last];
    for i in (0..n_tokens - 1).rev() {
        best_last = backptr[i + 1][best_last];
        best_sequence[i] = tags[best_last];
    }
    best_sequence
}

/// Índice do máximo; o primeiro vence em caso de empate.
fn best_in_slice(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(n: usize) -> Vec<Vec<f64>> {
        vec![vec![0.0; n]; n]
    }

    #[test]
    fn test_viterbi_empty() {
        assert!(viterbi_decode(&[], &zeros(3)).is_empty());
    }

    #[test]
    fn test_ties_prefer_outside() {
        let emission = vec![vec![0.0; 3]; 4];
        let result = viterbi_decode(&emission, &zeros(3));
        assert_eq!(result, vec![Tag::Outside; 4]);
    }

    #[test]
    fn test_inside_never_starts_or_follows_outside() {
        // I-0 tem o maior score de emissão em todo token
        let emission = vec![vec![0.0, 1.0, 5.0]; 3];
        let result = viterbi_decode(&emission, &zeros(3));
        assert_eq!(result, vec![Tag::Begin(0), Tag::Inside(0), Tag::Inside(0)]);
    }

    #[test]
    fn test_transitions_shape_the_path() {
        // 2 categorias: O, B-0, I-0, B-1, I-1
        let emission = vec![
            vec![0.0, 2.0, 0.0, 1.9, 0.0],
            vec![1.0, 0.0, 0.5, 0.0, 0.5],
        ];
        let mut transitions = zeros(5);
        transitions[Tag::Begin(1).index()][Tag::Inside(1).index()] = 2.0;
        let result = viterbi_decode(&emission, &transitions);
        assert_eq!(result, vec![Tag::Begin(1), Tag::Inside(1)]);
    }
}
