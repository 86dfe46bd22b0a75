//! Paddle-ball game
//!
//! A Pong-style match on the unit square. The agent controls the right
//! paddle, a speed-limited opponent tracks the ball with the left one. A
//! point is scored whenever the ball leaves the field past a paddle; the
//! match ends when either side reaches `points_to_win`.
//!
//! Coordinates grow rightwards and downwards, like the rendered image.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use paddle_rl_core::{
    DiscreteAction, DiscreteSpace, Environment, Observation, RLError, Result, Reward, Step,
    StepInfo,
};

/// Paddle stays put
pub const STAY: DiscreteAction = DiscreteAction(0);
/// Paddle moves up
pub const UP: DiscreteAction = DiscreteAction(1);
/// Paddle moves down
pub const DOWN: DiscreteAction = DiscreteAction(2);

const BACKGROUND: [u8; 3] = [144, 72, 17];
const AGENT_COLOR: [u8; 3] = [92, 186, 92];
const OPPONENT_COLOR: [u8; 3] = [213, 130, 74];
const BALL_COLOR: [u8; 3] = [236, 236, 236];

/// Game parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleConfig {
    /// Rendered frame width in pixels
    pub width: usize,
    /// Rendered frame height in pixels
    pub height: usize,
    /// Paddle length as a fraction of the field height
    pub paddle_height: f64,
    /// Paddle thickness as a fraction of the field width
    pub paddle_width: f64,
    /// Distance from each side wall to its paddle
    pub paddle_margin: f64,
    /// Agent paddle displacement per step
    pub paddle_speed: f64,
    /// Opponent paddle displacement cap per step
    pub opponent_speed: f64,
    /// Horizontal ball speed per step
    pub ball_speed: f64,
    /// Ball side length as a fraction of the field
    pub ball_size: f64,
    /// Points that end the match
    pub points_to_win: u32,
}

impl Default for PaddleConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 80,
            paddle_height: 0.2,
            paddle_width: 0.025,
            paddle_margin: 0.05,
            paddle_speed: 0.04,
            opponent_speed: 0.025,
            ball_speed: 0.025,
            ball_size: 0.025,
            points_to_win: 21,
        }
    }
}

impl PaddleConfig {
    /// Reject values the game cannot be played with
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RLError::Config("frame size must be positive".to_string()));
        }
        if self.points_to_win == 0 {
            return Err(RLError::Config("points_to_win must be positive".to_string()));
        }
        let fractions = [
            ("paddle_height", self.paddle_height),
            ("paddle_width", self.paddle_width),
            ("paddle_margin", self.paddle_margin),
            ("paddle_speed", self.paddle_speed),
            ("opponent_speed", self.opponent_speed),
            ("ball_speed", self.ball_speed),
            ("ball_size", self.ball_size),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value < 0.5) {
                return Err(RLError::Config(format!(
                    "{name} must lie in (0, 0.5), got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// RGB image, row-major, three bytes per pixel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// `height * width * 3` bytes
    pub pixels: Vec<u8>,
}

impl RawFrame {
    fn filled(width: usize, height: usize, color: [u8; 3]) -> Self {
        let pixels = color.iter().copied().cycle().take(width * height * 3).collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Color of the pixel at row `y`, column `x`
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, color: [u8; 3]) {
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                let i = (y * self.width + x) * 3;
                self.pixels[i..i + 3].copy_from_slice(&color);
            }
        }
    }
}

impl Observation for RawFrame {
    fn shape(&self) -> Vec<usize> {
        vec![self.height, self.width, 3]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ball {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

/// Paddle-ball match against a scripted opponent
#[derive(Debug)]
pub struct PaddleBallEnv {
    config: PaddleConfig,
    rng: StdRng,
    ball: Ball,
    agent_y: f64,
    opponent_y: f64,
    agent_points: u32,
    opponent_points: u32,
    steps: usize,
    finished: bool,
}

impl PaddleBallEnv {
    /// Create a game; a seed makes every serve reproducible
    pub fn new(config: PaddleConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng,
            ball: Ball {
                x: 0.5,
                y: 0.5,
                vx: 0.0,
                vy: 0.0,
            },
            agent_y: 0.5,
            opponent_y: 0.5,
            agent_points: 0,
            opponent_points: 0,
            steps: 0,
            finished: true,
        })
    }

    /// Game parameters
    #[must_use]
    pub fn config(&self) -> &PaddleConfig {
        &self.config
    }

    /// `(agent, opponent)` points in the current match
    #[must_use]
    pub fn score(&self) -> (u32, u32) {
        (self.agent_points, self.opponent_points)
    }

    fn agent_x(&self) -> f64 {
        1.0 - self.config.paddle_margin
    }

    fn opponent_x(&self) -> f64 {
        self.config.paddle_margin
    }

    /// Put the ball in the middle heading toward `toward_agent`'s side
    fn serve(&mut self, toward_agent: bool) {
        let speed = self.config.ball_speed;
        let vy = self.rng.gen_range(-0.75..=0.75) * speed;
        self.ball = Ball {
            x: 0.5,
            y: self.rng.gen_range(0.25..=0.75),
            vx: if toward_agent { speed } else { -speed },
            vy,
        };
    }

    fn clamp_paddle(&self, y: f64) -> f64 {
        let half = self.config.paddle_height / 2.0;
        y.clamp(half, 1.0 - half)
    }

    /// Reflect off a paddle face crossed this step; returns whether it hit
    fn deflect(&mut self, face: f64, paddle_y: f64, moving_right: bool) -> bool {
        let crossed = if moving_right {
            self.ball.x >= face && self.ball.x - self.ball.vx < face
        } else {
            self.ball.x <= face && self.ball.x - self.ball.vx > face
        };
        let reach = (self.config.paddle_height + self.config.ball_size) / 2.0;
        if !crossed || (self.ball.y - paddle_y).abs() > reach {
            return false;
        }

        self.ball.x = 2.0 * face - self.ball.x;
        self.ball.vx = -self.ball.vx;
        // Off-center hits steer the ball
        let offset = (self.ball.y - paddle_y) / reach;
        let cap = 1.5 * self.config.ball_speed;
        self.ball.vy = (self.ball.vy + offset * self.config.ball_speed).clamp(-cap, cap);
        true
    }

    fn render(&self) -> RawFrame {
        let (w, h) = (self.config.width, self.config.height);
        let mut frame = RawFrame::filled(w, h, BACKGROUND);
        let to_px = |v: f64, size: usize| -> usize {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let px = (v * size as f64).floor().max(0.0) as usize;
            px.min(size)
        };
        let mut rect = |cx: f64, cy: f64, half_w: f64, half_h: f64, color: [u8; 3]| {
            let x0 = to_px(cx - half_w, w);
            let x1 = to_px(cx + half_w, w).max(x0 + 1);
            let y0 = to_px(cy - half_h, h);
            let y1 = to_px(cy + half_h, h).max(y0 + 1);
            frame.fill_rect(x0, y0, x1, y1, color);
        };

        let half_pw = self.config.paddle_width / 2.0;
        let half_ph = self.config.paddle_height / 2.0;
        let half_ball = self.config.ball_size / 2.0;
        rect(self.opponent_x(), self.opponent_y, half_pw, half_ph, OPPONENT_COLOR);
        rect(self.agent_x(), self.agent_y, half_pw, half_ph, AGENT_COLOR);
        if (0.0..=1.0).contains(&self.ball.x) {
            rect(self.ball.x, self.ball.y, half_ball, half_ball, BALL_COLOR);
        }
        frame
    }

    fn info(&self) -> StepInfo {
        StepInfo::default()
            .with("agent_points", self.agent_points)
            .with("opponent_points", self.opponent_points)
            .with("steps", self.steps)
    }
}

impl Environment for PaddleBallEnv {
    type Observation = RawFrame;

    fn action_space(&self) -> DiscreteSpace {
        DiscreteSpace::new(3)
    }

    fn observation_shape(&self) -> Vec<usize> {
        vec![self.config.height, self.config.width, 3]
    }

    fn reset(&mut self) -> Result<(RawFrame, StepInfo)> {
        self.agent_y = 0.5;
        self.opponent_y = 0.5;
        self.agent_points = 0;
        self.opponent_points = 0;
        self.steps = 0;
        self.finished = false;
        let toward_agent = self.rng.gen_bool(0.5);
        self.serve(toward_agent);
        Ok((self.render(), self.info()))
    }

    fn step(&mut self, action: DiscreteAction) -> Result<Step<RawFrame>> {
        let action = self.action_space().check(action)?;
        if self.finished {
            return Err(RLError::Environment(
                "step called on a finished match; call reset first".to_string(),
            ));
        }
        self.steps += 1;

        let shift = match action {
            UP => -self.config.paddle_speed,
            DOWN => self.config.paddle_speed,
            _ => 0.0,
        };
        self.agent_y = self.clamp_paddle(self.agent_y + shift);
        let chase = (self.ball.y - self.opponent_y)
            .clamp(-self.config.opponent_speed, self.config.opponent_speed);
        self.opponent_y = self.clamp_paddle(self.opponent_y + chase);

        self.ball.x += self.ball.vx;
        self.ball.y += self.ball.vy;
        if self.ball.y < 0.0 {
            self.ball.y = -self.ball.y;
            self.ball.vy = -self.ball.vy;
        } else if self.ball.y > 1.0 {
            self.ball.y = 2.0 - self.ball.y;
            self.ball.vy = -self.ball.vy;
        }

        let half_pw = self.config.paddle_width / 2.0;
        if self.ball.vx > 0.0 {
            let face = self.agent_x() - half_pw;
            if self.deflect(face, self.agent_y, true) {
                trace!(step = self.steps, "agent returned the ball");
            }
        } else {
            let face = self.opponent_x() + half_pw;
            self.deflect(face, self.opponent_y, false);
        }

        let mut reward = 0.0;
        if self.ball.x > 1.0 {
            self.opponent_points += 1;
            reward = -1.0;
            self.serve(false);
        } else if self.ball.x < 0.0 {
            self.agent_points += 1;
            reward = 1.0;
            self.serve(true);
        }

        let target = self.config.points_to_win;
        let done = self.agent_points >= target || self.opponent_points >= target;
        if done {
            self.finished = true;
            debug!(
                agent = self.agent_points,
                opponent = self.opponent_points,
                steps = self.steps,
                "match over"
            );
        }

        Ok(Step {
            observation: self.render(),
            reward: Reward(reward),
            done,
            truncated: false,
            info: self.info(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(points: u32, seed: u64) -> PaddleBallEnv {
        let config = PaddleConfig {
            points_to_win: points,
            ..PaddleConfig::default()
        };
        PaddleBallEnv::new(config, Some(seed)).unwrap()
    }

    fn play_out(env: &mut PaddleBallEnv, action: DiscreteAction) -> (f64, usize) {
        let mut total = 0.0;
        for steps in 1..100_000 {
            let step = env.step(action).unwrap();
            assert!(step.reward.0 == 0.0 || step.reward.0.abs() == 1.0);
            total += step.reward.0;
            if step.done {
                return (total, steps);
            }
        }
        panic!("match never ended");
    }

    #[test]
    fn test_reset_renders_configured_frame() {
        let mut env = env(1, 0);
        let (frame, info) = env.reset().unwrap();
        assert_eq!(frame.shape(), vec![80, 80, 3]);
        assert_eq!(frame.pixels.len(), 80 * 80 * 3);
        assert_eq!(frame.pixel(0, 0), BACKGROUND);
        // Agent paddle centered on the right
        assert_eq!(frame.pixel(76, 40), AGENT_COLOR);
        assert_eq!(frame.pixel(3, 40), OPPONENT_COLOR);
        assert_eq!(info.fields.get("agent_points"), Some(&serde_json::json!(0)));
    }

    #[test]
    fn test_invalid_action_rejected() {
        let mut env = env(1, 1);
        env.reset().unwrap();
        assert!(matches!(
            env.step(DiscreteAction(3)),
            Err(RLError::InvalidAction { action: 3, num_actions: 3 })
        ));
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = env(1, 1);
        assert!(matches!(env.step(STAY), Err(RLError::Environment(_))));
    }

    #[test]
    fn test_match_ends_at_points_to_win() {
        let mut env = env(3, 2);
        env.reset().unwrap();
        let (total, _) = play_out(&mut env, UP);
        let (agent, opponent) = env.score();
        assert!(agent == 3 || opponent == 3);
        assert_eq!(total, f64::from(agent) - f64::from(opponent));
        assert!(env.step(STAY).is_err());
    }

    #[test]
    fn test_paddle_stays_in_field() {
        let mut env = env(100, 3);
        env.reset().unwrap();
        for _ in 0..50 {
            env.step(UP).unwrap();
        }
        assert!((env.agent_y - env.config.paddle_height / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_seeded_games_repeat() {
        let run = |seed| {
            let mut env = env(2, seed);
            env.reset().unwrap();
            play_out(&mut env, DOWN)
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_config_validation() {
        let bad = PaddleConfig {
            paddle_height: 0.0,
            ..PaddleConfig::default()
        };
        assert!(matches!(PaddleBallEnv::new(bad, None), Err(RLError::Config(_))));
    }
}
