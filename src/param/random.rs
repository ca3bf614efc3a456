//! random.rs
//! Seeded sampling of the supported distributions.

use super::types::RandomDistribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

/// Expected value of a distribution.
pub fn mean(distribution: &RandomDistribution) -> f64 {
    match *distribution {
        RandomDistribution::Normal { mean, .. } => mean,
        RandomDistribution::Lognormal { scale, shape } => (scale + shape * shape / 2.0).exp(),
        RandomDistribution::Uniform { a, b } => (a + b.max(a)) / 2.0,
        RandomDistribution::Bernoulli { p } => p,
        RandomDistribution::Poisson { rate } => rate,
        RandomDistribution::Exponential { rate } => 1.0 / rate,
        RandomDistribution::Erlang { shape, rate } => shape / rate,
        RandomDistribution::Weibull { scale, shape } => scale * gamma(1.0 + 1.0 / shape),
    }
}

/// Lanczos approximation (g = 7).
fn gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        return PI / ((PI * x).sin() * gamma(1.0 - x));
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let sum = COEFFS[1..]
        .iter()
        .enumerate()
        .fold(COEFFS[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * sum
}

/// Random source for one simulation run. A fixed seed reproduces a run.
#[derive(Debug, Clone)]
pub struct Sampler {
    rng: ChaCha8Rng,
}

impl Sampler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }

    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn standard_normal(&mut self) -> f64 {
        // Box-Muller; 1 - u keeps ln() away from zero
        let u1 = 1.0 - self.unit();
        let u2 = self.unit();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        if std_dev <= 0.0 || !std_dev.is_finite() {
            return mean;
        }
        mean + std_dev * self.standard_normal()
    }

    fn exponential(&mut self, rate: f64) -> f64 {
        -(1.0 - self.unit()).ln() / rate
    }

    fn poisson(&mut self, lambda: f64) -> f64 {
        if lambda <= 0.0 {
            return 0.0;
        }
        if lambda < 30.0 {
            let l = (-lambda).exp();
            let mut k = 0.0;
            let mut p = 1.0;
            loop {
                p *= self.unit();
                if p <= l {
                    return k;
                }
                k += 1.0;
            }
        }
        (lambda + lambda.sqrt() * self.standard_normal()).round().max(0.0)
    }

    pub fn sample(&mut self, distribution: &RandomDistribution) -> f64 {
        match *distribution {
            RandomDistribution::Normal { mean, stddev } => self.normal(mean, stddev),
            RandomDistribution::Lognormal { scale, shape } => (scale + shape * self.standard_normal()).exp(),
            RandomDistribution::Uniform { a, b } => a + (b.max(a) - a) * self.unit(),
            RandomDistribution::Bernoulli { p } => {
                if self.unit() < p {
                    1.0
                } else {
                    0.0
                }
            }
            RandomDistribution::Poisson { rate } => self.poisson(rate),
            RandomDistribution::Exponential { rate } => self.exponential(rate),
            RandomDistribution::Erlang { shape, rate } => {
                let k = shape.round().max(1.0) as usize;
                (0..k).map(|_| self.exponential(rate)).sum()
            }
            RandomDistribution::Weibull { scale, shape } => scale * (-(1.0 - self.unit()).ln()).powf(1.0 / shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[rstest]
    #[case(RandomDistribution::Normal { mean: 5.0, stddev: 1.0 }, 5.0)]
    #[case(RandomDistribution::Uniform { a: 2.0, b: 4.0 }, 3.0)]
    #[case(RandomDistribution::Uniform { a: 4.0, b: 2.0 }, 4.0)]
    #[case(RandomDistribution::Bernoulli { p: 0.3 }, 0.3)]
    #[case(RandomDistribution::Poisson { rate: 7.0 }, 7.0)]
    #[case(RandomDistribution::Exponential { rate: 4.0 }, 0.25)]
    #[case(RandomDistribution::Erlang { shape: 3.0, rate: 2.0 }, 1.5)]
    #[case(RandomDistribution::Weibull { scale: 2.0, shape: 1.0 }, 2.0)]
    fn test_means(#[case] d: RandomDistribution, #[case] expected: f64) {
        assert!(close(mean(&d), expected, 1e-9), "{:?} -> {}", d, mean(&d));
    }

    #[test]
    fn test_gamma() {
        assert!(close(gamma(5.0), 24.0, 1e-9));
        assert!(close(gamma(0.5), PI.sqrt(), 1e-9));
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let d = RandomDistribution::Lognormal { scale: 0.0, shape: 0.5 };
        let mut a = Sampler::new(Some(42));
        let mut b = Sampler::new(Some(42));
        for _ in 0..10 {
            assert_eq!(a.sample(&d), b.sample(&d));
        }
    }

    #[rstest]
    #[case(RandomDistribution::Normal { mean: 10.0, stddev: 2.0 })]
    #[case(RandomDistribution::Poisson { rate: 4.0 })]
    #[case(RandomDistribution::Poisson { rate: 50.0 })]
    #[case(RandomDistribution::Exponential { rate: 0.5 })]
    #[case(RandomDistribution::Weibull { scale: 3.0, shape: 2.0 })]
    fn test_sample_mean_converges(#[case] d: RandomDistribution) {
        let mut sampler = Sampler::new(Some(7));
        let n = 20_000;
        let avg = (0..n).map(|_| sampler.sample(&d)).sum::<f64>() / n as f64;
        let expected = mean(&d);
        assert!(close(avg, expected, expected * 0.05), "{:?}: {} vs {}", d, avg, expected);
    }

    #[test]
    fn test_zero_std_dev_returns_mean() {
        let mut sampler = Sampler::new(Some(1));
        assert_eq!(sampler.normal(3.0, 0.0), 3.0);
    }
}
