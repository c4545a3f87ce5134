use rand::Rng;

pub mod logging;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Uniform pick from a non-empty pool.
pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, pool: &'a [T]) -> &'a T {
    &pool[rng.gen_range(0..pool.len())]
}

/// Lowercase alphanumeric suffix, as used in generated pod names and tokens.
pub fn random_base36<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Kubernetes-style age: `1-60m`, `1-24h` or `1-30d`.
pub fn random_age<R: Rng + ?Sized>(rng: &mut R) -> String {
    let (unit, max) = *pick(rng, &[('m', 60), ('h', 24), ('d', 30)]);
    format!("{}{}", rng.gen_range(1..=max), unit)
}

/// Float in `[min, max)` rounded to one decimal.
pub fn random_tenths<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    (rng.gen_range(min..max) * 10.0).round() / 10.0
}

pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_age_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let age = random_age(&mut rng);
            let (num, unit) = age.split_at(age.len() - 1);
            let n: u32 = num.parse().unwrap();
            match unit {
                "m" => assert!((1..=60).contains(&n)),
                "h" => assert!((1..=24).contains(&n)),
                "d" => assert!((1..=30).contains(&n)),
                other => panic!("unexpected unit {}", other),
            }
        }
    }

    #[test]
    fn test_random_base36_alphabet() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = random_base36(&mut rng, 13);
        assert_eq!(s.len(), 13);
        assert!(s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_random_tenths_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = random_tenths(&mut rng, 10.0, 85.0);
            assert!((10.0..=85.0).contains(&v));
            assert!(((v * 10.0).round() - v * 10.0).abs() < 1e-9);
        }
    }
}
