use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread::{self, JoinHandle},
};

use log::{debug, warn};
use serde_json::Value;

use crate::{
    EnvErr, Result,
    env::{Environment, StepOutput},
    space::BoxSpace,
};

/// The info key under which an auto-reset worker reports the last observation of the
/// finished episode.
pub const TERMINAL_OBSERVATION: &str = "terminal_observation";

enum Command {
    Reset,
    Step(Vec<f32>),
    Close,
}

enum Reply {
    Spaces(BoxSpace, BoxSpace),
    Observation(Vec<f32>),
    Step(StepOutput),
}

struct WorkerHandle {
    tx: Sender<Command>,
    rx: Receiver<Result<Reply>>,
    thread: Option<JoinHandle<()>>,
}

/// A batch of isolated environments, each living on its own thread.
///
/// Every worker builds and owns its environment, so native simulations that keep per-thread
/// state never see each other. Finished episodes are reset automatically.
pub struct VecEnv {
    workers: Vec<WorkerHandle>,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl VecEnv {
    /// Spawns `n` workers.
    ///
    /// # Arguments
    /// * `n` - The amount of environments.
    /// * `make_env` - Builds the environment of the worker with the given index, it runs on
    ///   the worker's own thread.
    ///
    /// # Returns
    /// The batch, `EnvErr::NoWorkers` if `n` is zero, or the first construction error.
    pub fn new<E, F>(n: usize, make_env: F) -> Result<Self>
    where
        E: Environment + 'static,
        F: Fn(usize) -> Result<E> + Send + Sync + Clone + 'static,
    {
        let mut workers = Vec::with_capacity(n);
        let mut spaces = None;

        for id in 0..n {
            let (cmd_tx, cmd_rx) = mpsc::channel();
            let (reply_tx, reply_rx) = mpsc::channel();
            let make_env = make_env.clone();

            let thread = thread::Builder::new()
                .name(format!("env-worker-{id}"))
                .spawn(move || run_worker(id, make_env, cmd_rx, reply_tx))
                .map_err(|_| EnvErr::WorkerGone { worker: id })?;

            let worker = WorkerHandle {
                tx: cmd_tx,
                rx: reply_rx,
                thread: Some(thread),
            };

            match worker.rx.recv() {
                Ok(Ok(Reply::Spaces(obs, act))) => {
                    spaces.get_or_insert((obs, act));
                }
                Ok(Err(e)) => return Err(e),
                _ => return Err(EnvErr::WorkerGone { worker: id }),
            }

            workers.push(worker);
        }

        let Some((observation_space, action_space)) = spaces else {
            return Err(EnvErr::NoWorkers);
        };
        debug!(workers = n; "vectorized environment ready");

        Ok(Self {
            workers,
            observation_space,
            action_space,
        })
    }

    pub fn num_envs(&self) -> usize {
        self.workers.len()
    }

    pub fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    pub fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    /// Resets every environment.
    ///
    /// # Returns
    /// One initial observation per worker, or the first worker error.
    pub fn reset_all(&mut self) -> Result<Vec<Vec<f32>>> {
        self.broadcast(|_| Command::Reset)?;

        self.collect()
            .into_iter()
            .map(|reply| -> Result<Vec<f32>> {
                match reply? {
                    Reply::Observation(obs) => Ok(obs),
                    _ => unreachable!("a reset is always answered with an observation"),
                }
            })
            .collect()
    }

    /// Steps every environment in parallel.
    ///
    /// # Arguments
    /// * `actions` - One action per worker.
    ///
    /// # Returns
    /// One result per worker, a fault only affects the worker it happened on.
    pub fn step_all(&mut self, actions: &[Vec<f32>]) -> Result<Vec<Result<StepOutput>>> {
        if actions.len() != self.workers.len() {
            return Err(EnvErr::BatchSize {
                got: actions.len(),
                expected: self.workers.len(),
            });
        }

        self.broadcast(|i| Command::Step(actions[i].clone()))?;

        let outputs = self
            .collect()
            .into_iter()
            .map(|reply| {
                reply.map(|reply| match reply {
                    Reply::Step(out) => out,
                    _ => unreachable!("a step is always answered with a step output"),
                })
            })
            .collect();

        Ok(outputs)
    }

    fn broadcast<F: Fn(usize) -> Command>(&self, cmd: F) -> Result<()> {
        for (worker, handle) in self.workers.iter().enumerate() {
            handle
                .tx
                .send(cmd(worker))
                .map_err(|_| EnvErr::WorkerGone { worker })?;
        }

        Ok(())
    }

    fn collect(&self) -> Vec<Result<Reply>> {
        self.workers
            .iter()
            .enumerate()
            .map(|(worker, handle)| {
                handle
                    .rx
                    .recv()
                    .unwrap_or(Err(EnvErr::WorkerGone { worker }))
            })
            .collect()
    }
}

impl Drop for VecEnv {
    fn drop(&mut self) {
        for handle in &mut self.workers {
            let _ = handle.tx.send(Command::Close);
            if let Some(thread) = handle.thread.take() {
                if thread.join().is_err() {
                    warn!("an environment worker panicked");
                }
            }
        }
    }
}

fn run_worker<E, F>(id: usize, make_env: F, rx: Receiver<Command>, tx: Sender<Result<Reply>>)
where
    E: Environment,
    F: Fn(usize) -> Result<E>,
{
    let mut env = match make_env(id) {
        Ok(env) => env,
        Err(e) => {
            let _ = tx.send(Err(e));
            return;
        }
    };

    let spaces = Reply::Spaces(env.observation_space().clone(), env.action_space().clone());
    if tx.send(Ok(spaces)).is_err() {
        return;
    }

    let mut faulted = false;

    while let Ok(cmd) = rx.recv() {
        let reply = match cmd {
            Command::Close => break,
            _ if faulted => Err(EnvErr::Faulted { worker: id }),
            Command::Reset => env.reset().map(Reply::Observation),
            Command::Step(action) => step_with_reset(&mut env, &action).map(Reply::Step),
        };

        if matches!(&reply, Err(EnvErr::Step(e)) if e.is_fault()) {
            warn!(worker = id; "environment worker faulted, refusing further commands");
            faulted = true;
        }

        if tx.send(reply).is_err() {
            break;
        }
    }

    debug!(worker = id; "environment worker stopped");
}

fn step_with_reset<E: Environment>(env: &mut E, action: &[f32]) -> Result<StepOutput> {
    let mut out = env.step(action)?;

    if out.done {
        let terminal = std::mem::replace(&mut out.observation, env.reset()?);
        out.info
            .insert(TERMINAL_OBSERVATION.to_string(), Value::from(terminal));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use sim::{AdapterStepError, mock};

    use super::*;
    use crate::LocoEnv;

    fn make(n: usize) -> VecEnv {
        VecEnv::new(n, |_| LocoEnv::new(mock::abi())).unwrap()
    }

    #[test]
    fn workers_are_isolated() {
        let mut envs = make(2);
        envs.reset_all().unwrap();

        // Push only the first worker around, the second one must not notice.
        let outs = envs
            .step_all(&[vec![1.0, 1.0], vec![0.0, 0.0]])
            .unwrap();
        let a = outs[0].as_ref().unwrap();
        let b = outs[1].as_ref().unwrap();
        assert!(a.observation[2] > 0.0);
        assert_eq!(b.observation[2], 0.0);
    }

    #[test]
    fn finished_episodes_are_reset() {
        let mut envs = make(1);
        envs.reset_all().unwrap();

        let out = loop {
            let mut outs = envs.step_all(&[vec![0.0, -1.0]]).unwrap();
            let out = outs.remove(0).unwrap();
            if out.done {
                break out;
            }
        };

        let terminal = out.info[TERMINAL_OBSERVATION].as_array().unwrap();
        assert_eq!(terminal.len(), mock::STATE_SIZE);
        assert!(terminal[1].as_f64().unwrap() < 0.0);
        assert_eq!(out.observation[1], mock::START_HEIGHT);
    }

    #[test]
    fn fault_is_reported_for_its_worker_only() {
        let mut envs = make(2);
        envs.reset_all().unwrap();

        let outs = envs
            .step_all(&[vec![f32::NAN, 0.0], vec![0.0, 0.0]])
            .unwrap();
        assert!(matches!(
            outs[0],
            Err(EnvErr::Step(AdapterStepError::NativeFault { .. }))
        ));
        assert!(outs[1].is_ok());

        // The faulted simulation is never stepped or reset again.
        let outs = envs.step_all(&[vec![0.0, 0.0], vec![0.0, 0.0]]).unwrap();
        assert!(matches!(outs[0], Err(EnvErr::Faulted { worker: 0 })));
        assert!(outs[1].is_ok());
        assert!(matches!(
            envs.reset_all(),
            Err(EnvErr::Faulted { worker: 0 })
        ));
    }

    #[test]
    fn a_wrong_action_length_is_not_a_fault() {
        let mut envs = make(1);
        envs.reset_all().unwrap();

        let outs = envs.step_all(&[vec![0.0]]).unwrap();
        assert!(matches!(
            outs[0],
            Err(EnvErr::Step(AdapterStepError::ActionLength { .. }))
        ));
        assert!(envs.step_all(&[vec![0.0, 0.0]]).unwrap()[0].is_ok());
    }

    #[test]
    fn needs_at_least_one_worker() {
        assert!(matches!(
            VecEnv::new(0, |_| LocoEnv::new(mock::abi())),
            Err(EnvErr::NoWorkers)
        ));
    }

    #[test]
    fn rejects_wrong_batch_size() {
        let mut envs = make(2);
        envs.reset_all().unwrap();
        assert!(matches!(
            envs.step_all(&[vec![0.0, 0.0]]),
            Err(EnvErr::BatchSize {
                got: 1,
                expected: 2
            })
        ));
    }
}
