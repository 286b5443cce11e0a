//! One (255, 223) codeword: systematic encode and Berlekamp–Massey decode.
//!
//! Bytes cross this module boundary in the dual basis — that is the on-wire
//! convention.  Both routines convert to the conventional basis on entry,
//! do all arithmetic there, and convert back on exit; the 223 payload bytes
//! therefore pass through `encode` unchanged while the 32 parity bytes come
//! out dual-basis, matching what `decode` expects.

use super::gf::{
    modnn, A0, ALPHA_TO, FCR, GENPOLY, INDEX_OF, IPRIM, KK, NN, NROOTS, PRIM, TAL1TAB, TALTAB,
};

/// Outcome of one codeword decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// All syndromes were zero.
    Clean,
    /// This many byte errors were located and corrected.
    Corrected(usize),
    /// The error locator had fewer roots than its degree; the codeword is
    /// left as received.
    Uncorrectable,
}

/// Fill `codeword[223..]` with the 32 parity bytes for `codeword[..223]`.
pub fn encode(codeword: &mut [u8; NN]) {
    // Dual basis → conventional for the payload.
    for byte in codeword[..KK].iter_mut() {
        *byte = TAL1TAB[*byte as usize];
    }

    // Polynomial division by g(x) through a 32-stage shift register.
    let (data, parity) = codeword.split_at_mut(KK);
    parity.fill(0);
    for i in 0..KK {
        let feedback = INDEX_OF[(data[i] ^ parity[0]) as usize];
        if feedback != A0 {
            for j in 1..NROOTS {
                parity[j] ^=
                    ALPHA_TO[modnn(feedback as usize + GENPOLY[NROOTS - j] as usize)];
            }
        }
        parity.copy_within(1.., 0);
        parity[NROOTS - 1] = if feedback != A0 {
            ALPHA_TO[modnn(feedback as usize + GENPOLY[0] as usize)]
        } else {
            0
        };
    }

    // Conventional → dual basis for the whole codeword; the payload bytes
    // come back out exactly as they went in.
    for byte in codeword.iter_mut() {
        *byte = TALTAB[*byte as usize];
    }
}

/// Decode one codeword in place, correcting up to 16 byte errors.
pub fn decode(codeword: &mut [u8; NN]) -> Repair {
    // Work on a conventional-basis copy; an uncorrectable codeword must
    // leave the received bytes untouched.
    let mut data = [0u8; NN];
    for (dst, &src) in data.iter_mut().zip(codeword.iter()) {
        *dst = TAL1TAB[src as usize];
    }

    // Syndromes at the 32 code roots, Horner over the received polynomial.
    let mut synd = [0u8; NROOTS];
    for s in synd.iter_mut() {
        *s = data[0];
    }
    for &byte in data.iter().skip(1) {
        for (i, s) in synd.iter_mut().enumerate() {
            *s = if *s == 0 {
                byte
            } else {
                byte ^ ALPHA_TO[modnn(INDEX_OF[*s as usize] as usize + (FCR + i) * PRIM)]
            };
        }
    }

    let mut syn_error = 0u8;
    let mut s_idx = [0u8; NROOTS];
    for (i, &s) in synd.iter().enumerate() {
        syn_error |= s;
        s_idx[i] = INDEX_OF[s as usize];
    }
    if syn_error == 0 {
        return Repair::Clean;
    }

    // Berlekamp–Massey, error-only.
    let mut lambda = [0u8; NROOTS + 1];
    lambda[0] = 1;
    let mut b = [0u8; NROOTS + 1];
    for (dst, &src) in b.iter_mut().zip(lambda.iter()) {
        *dst = INDEX_OF[src as usize];
    }

    let mut el = 0usize;
    for r in 1..=NROOTS {
        let mut discr = 0u8;
        for i in 0..r {
            if lambda[i] != 0 && s_idx[r - i - 1] != A0 {
                discr ^= ALPHA_TO
                    [modnn(INDEX_OF[lambda[i] as usize] as usize + s_idx[r - i - 1] as usize)];
            }
        }
        let discr_idx = INDEX_OF[discr as usize];
        if discr_idx == A0 {
            // B(x) ← x·B(x)
            b.copy_within(0..NROOTS, 1);
            b[0] = A0;
        } else {
            // T(x) ← λ(x) − Δ·x·B(x)
            let mut t = [0u8; NROOTS + 1];
            t[0] = lambda[0];
            for i in 0..NROOTS {
                t[i + 1] = if b[i] != A0 {
                    lambda[i + 1] ^ ALPHA_TO[modnn(discr_idx as usize + b[i] as usize)]
                } else {
                    lambda[i + 1]
                };
            }
            if 2 * el <= r - 1 {
                el = r - el;
                // B(x) ← Δ⁻¹·λ(x)
                for i in 0..=NROOTS {
                    b[i] = if lambda[i] == 0 {
                        A0
                    } else {
                        modnn(INDEX_OF[lambda[i] as usize] as usize + NN
                            - discr_idx as usize) as u8
                    };
                }
            } else {
                b.copy_within(0..NROOTS, 1);
                b[0] = A0;
            }
            lambda = t;
        }
    }

    // λ to index form; its degree bounds the number of errors.
    let mut deg_lambda = 0usize;
    let mut lam_idx = [0u8; NROOTS + 1];
    for (i, &l) in lambda.iter().enumerate() {
        lam_idx[i] = INDEX_OF[l as usize];
        if lam_idx[i] != A0 {
            deg_lambda = i;
        }
    }

    // Chien search for the roots of λ.
    let mut reg = [0u8; NROOTS + 1];
    reg[1..].copy_from_slice(&lam_idx[1..]);
    let mut roots = [0usize; NROOTS];
    let mut locs = [0usize; NROOTS];
    let mut count = 0usize;
    let mut k = IPRIM - 1;
    let mut i = 1;
    while i <= NN {
        let mut q = 1u8; // λ[0] is always 1
        for j in (1..=deg_lambda).rev() {
            if reg[j] != A0 {
                reg[j] = modnn(reg[j] as usize + j) as u8;
                q ^= ALPHA_TO[reg[j] as usize];
            }
        }
        if q == 0 {
            roots[count] = i;
            locs[count] = k;
            count += 1;
            if count == deg_lambda {
                break;
            }
        }
        i += 1;
        k = modnn(k + IPRIM);
    }
    if count != deg_lambda {
        return Repair::Uncorrectable;
    }

    // Evaluator ω(x) = S(x)·λ(x) mod x³², index form.
    let deg_omega = deg_lambda - 1;
    let mut omega = [A0; NROOTS + 1];
    for i in 0..=deg_omega {
        let mut tmp = 0u8;
        for j in (0..=i).rev() {
            if s_idx[i - j] != A0 && lam_idx[j] != A0 {
                tmp ^= ALPHA_TO[modnn(s_idx[i - j] as usize + lam_idx[j] as usize)];
            }
        }
        omega[i] = INDEX_OF[tmp as usize];
    }

    // Forney: error magnitude at each located position.
    for j in (0..count).rev() {
        let mut num1 = 0u8;
        for i in (0..=deg_omega).rev() {
            if omega[i] != A0 {
                num1 ^= ALPHA_TO[modnn(omega[i] as usize + i * roots[j])];
            }
        }
        let num2 = ALPHA_TO[modnn(roots[j] * (FCR - 1))];
        let mut den = 0u8;
        // λ'(x) takes the odd-power coefficients of λ.
        let mut i = deg_lambda.min(NROOTS - 1) & !1;
        loop {
            if lam_idx[i + 1] != A0 {
                den ^= ALPHA_TO[modnn(lam_idx[i + 1] as usize + i * roots[j])];
            }
            if i < 2 {
                break;
            }
            i -= 2;
        }
        if den == 0 {
            return Repair::Uncorrectable;
        }
        if num1 != 0 {
            data[locs[j]] ^= ALPHA_TO[modnn(
                INDEX_OF[num1 as usize] as usize
                    + INDEX_OF[num2 as usize] as usize
                    + NN
                    - INDEX_OF[den as usize] as usize,
            )];
        }
    }

    // Corrected codeword back to the wire basis.
    for (dst, &src) in codeword.iter_mut().zip(data.iter()) {
        *dst = TALTAB[src as usize];
    }
    Repair::Corrected(count)
}
