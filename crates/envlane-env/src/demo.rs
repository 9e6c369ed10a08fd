//! Built-in pole-balance demo environment.
//!
//! A small cart-and-pole system: two discrete actions (push left, push
//! right), a four-component observation, and an RGB render of the track.
//! It exists so the service is exercisable end to end without an external
//! environment library.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

use envlane_protocol::{Dtype, Tensor};

use crate::env::{EnvError, Environment, StepOutcome};
use crate::space::Space;

const GRAVITY: f64 = 9.8;
const CART_MASS: f64 = 1.0;
const POLE_MASS: f64 = 0.1;
const POLE_HALF_LENGTH: f64 = 0.5;
const FORCE: f64 = 10.0;
const TAU: f64 = 0.02;

const X_LIMIT: f64 = 2.4;
const THETA_LIMIT: f64 = 12.0 * std::f64::consts::PI / 180.0;

const RENDER_HEIGHT: usize = 48;
const RENDER_WIDTH: usize = 64;

const DEFAULT_MAX_STEPS: u64 = 300;

/// Pole-balance environment, registered as `demo-env`.
#[derive(Debug)]
pub struct DemoEnv {
    // [cart position, cart velocity, pole angle, pole angular velocity]
    state: [f64; 4],
    rng: StdRng,
    steps: u64,
    max_steps: u64,
    needs_reset: bool,
    closed: bool,
}

impl DemoEnv {
    /// Construct from `make` kwargs. Recognized keys: `max_steps`, `seed`,
    /// `render_mode` (only `"rgb_array"`).
    pub fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self, EnvError> {
        let mut max_steps = DEFAULT_MAX_STEPS;
        let mut rng = StdRng::from_entropy();

        for (key, value) in kwargs {
            match key.as_str() {
                "max_steps" => {
                    max_steps = value.as_u64().ok_or_else(|| EnvError::InvalidKwarg {
                        key: key.clone(),
                        reason: format!("expected a positive integer, got {}", value),
                    })?;
                }
                "seed" => {
                    let seed = value.as_u64().ok_or_else(|| EnvError::InvalidKwarg {
                        key: key.clone(),
                        reason: format!("expected an unsigned integer, got {}", value),
                    })?;
                    rng = StdRng::seed_from_u64(seed);
                }
                "render_mode" => {
                    if value.as_str() != Some("rgb_array") {
                        return Err(EnvError::InvalidKwarg {
                            key: key.clone(),
                            reason: format!("only \"rgb_array\" is supported, got {}", value),
                        });
                    }
                }
                _ => {
                    return Err(EnvError::InvalidKwarg {
                        key: key.clone(),
                        reason: "unrecognized option".to_string(),
                    });
                }
            }
        }

        Ok(Self {
            state: [0.0; 4],
            rng,
            steps: 0,
            max_steps,
            needs_reset: true,
            closed: false,
        })
    }

    fn guard_open(&self) -> Result<(), EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        Ok(())
    }

    fn observation(&self) -> Value {
        let data = self.state.iter().copied().collect();
        // Shape [4] with four elements cannot mismatch.
        Tensor::new(vec![4], Dtype::F32, data)
            .map(|t| t.to_value())
            .unwrap_or(Value::Null)
    }

    /// One Euler step of the cart-pole dynamics.
    fn integrate(&mut self, push_right: bool) {
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if push_right { FORCE } else { -FORCE };

        let cos_theta = theta.cos();
        let sin_theta = theta.sin();
        let total_mass = CART_MASS + POLE_MASS;
        let pole_moment = POLE_MASS * POLE_HALF_LENGTH;

        let temp = (force + pole_moment * theta_dot * theta_dot * sin_theta) / total_mass;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (POLE_HALF_LENGTH
                * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass));
        let x_acc = temp - pole_moment * theta_acc * cos_theta / total_mass;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
    }

    fn render_pixels(&self) -> Value {
        let mut pixels = vec![235.0; RENDER_HEIGHT * RENDER_WIDTH * 3];

        // Track line.
        let track_row = RENDER_HEIGHT - 8;
        for col in 0..RENDER_WIDTH {
            set_pixel(&mut pixels, track_row, col, [40.0, 40.0, 40.0]);
        }

        // Cart body, centered on the scaled position.
        let half_range = X_LIMIT;
        let fraction = ((self.state[0] + half_range) / (2.0 * half_range)).clamp(0.0, 1.0);
        let cart_col = (fraction * (RENDER_WIDTH - 1) as f64) as usize;
        for row in (track_row - 4)..track_row {
            for offset in -3i64..=3 {
                let col = cart_col as i64 + offset;
                if (0..RENDER_WIDTH as i64).contains(&col) {
                    set_pixel(&mut pixels, row, col as usize, [30.0, 30.0, 200.0]);
                }
            }
        }

        // Pole, leaning with the angle.
        let lean = self.state[2] / THETA_LIMIT;
        for height in 1..=16usize {
            let row = track_row - 4 - height;
            let col = cart_col as i64 + (lean * height as f64 * 0.5) as i64;
            if (0..RENDER_WIDTH as i64).contains(&col) {
                set_pixel(&mut pixels, row, col as usize, [180.0, 90.0, 30.0]);
            }
        }

        Tensor::new(
            vec![RENDER_HEIGHT as u64, RENDER_WIDTH as u64, 3],
            Dtype::U8,
            pixels,
        )
        .map(|t| t.to_value())
        .unwrap_or(Value::Null)
    }
}

fn set_pixel(pixels: &mut [f64], row: usize, col: usize, rgb: [f64; 3]) {
    let base = (row * RENDER_WIDTH + col) * 3;
    pixels[base..base + 3].copy_from_slice(&rgb);
}

impl Environment for DemoEnv {
    fn observation_space(&self) -> Space {
        Space::Box {
            low: vec![-X_LIMIT, f64::NEG_INFINITY, -THETA_LIMIT, f64::NEG_INFINITY],
            high: vec![X_LIMIT, f64::INFINITY, THETA_LIMIT, f64::INFINITY],
            shape: vec![4],
            dtype: Dtype::F32,
        }
    }

    fn action_space(&self) -> Space {
        Space::Discrete { n: 2 }
    }

    fn render_fps(&self) -> Option<f64> {
        Some(30.0)
    }

    fn reset(&mut self) -> Result<(Value, Map<String, Value>), EnvError> {
        self.guard_open()?;
        for component in &mut self.state {
            *component = self.rng.gen_range(-0.05..0.05);
        }
        self.steps = 0;
        self.needs_reset = false;
        Ok((self.observation(), Map::new()))
    }

    fn step(&mut self, action: &Value) -> Result<StepOutcome, EnvError> {
        self.guard_open()?;
        if self.needs_reset {
            return Err(EnvError::NotReady("step called before reset".to_string()));
        }

        let choice = action
            .as_u64()
            .filter(|&a| a < 2)
            .ok_or_else(|| EnvError::InvalidAction(format!("expected 0 or 1, got {}", action)))?;

        self.integrate(choice == 1);
        self.steps += 1;

        let terminated =
            self.state[0].abs() > X_LIMIT || self.state[2].abs() > THETA_LIMIT;
        let truncated = !terminated && self.steps >= self.max_steps;
        if terminated || truncated {
            self.needs_reset = true;
        }

        let mut info = Map::new();
        info.insert("steps".to_string(), Value::from(self.steps));

        Ok(StepOutcome {
            observation: self.observation(),
            reward: 1.0,
            terminated,
            truncated,
            info,
        })
    }

    fn render(&mut self) -> Result<Value, EnvError> {
        self.guard_open()?;
        if self.needs_reset {
            return Err(EnvError::NotReady("render called before reset".to_string()));
        }
        Ok(self.render_pixels())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
