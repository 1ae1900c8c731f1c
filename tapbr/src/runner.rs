//! Bridge bring-up and teardown on DPDK.
//!
//! Startup order: EAL, port checks, mbuf pool, fan-out rings, queue plan,
//! port bring-up, then one forwarding loop per planned worker lcore. Ports
//! are stopped only after every worker has returned; rings and the pool are
//! released after the ports.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::rte::eal::Eal;
use crate::api::rte::eth::{EthDev, EthDevBuilder};
use crate::api::rte::lcore::Lcore;
use crate::api::rte::pktmbuf::{MemPool, MemPoolConfig};
use crate::api::rte::queue::EthQueue;
use crate::api::rte::ring::Ring;
use crate::api::rte_strerror;
use crate::config::BridgeConfig;
use crate::control::ControlPlane;
use crate::error::{DpdkContext, Error, Result};
use crate::forward::ForwardLoop;
use crate::output::{MirrorTarget, OutputMode, ProducerMode, RingSet};
use crate::planner::QueuePlan;
use crate::port::QueueId;
use crate::shutdown::{ShutdownFlag, install_signal_handler};
use crate::stats::BridgeStats;

const POOL_NAME: &str = "rx_pool";

type DpdkLoop = ForwardLoop<EthQueue, MemPool, Ring>;

/// Started ports, stopped and closed on drop.
struct StartedPorts(Vec<EthDev>);

impl Drop for StartedPorts {
    fn drop(&mut self) {
        for dev in self.0.drain(..) {
            if let Err(e) = dev.stop() {
                warn!(port = dev.port_id(), error = %e, "port stop failed");
            }
            if let Err(e) = dev.close() {
                warn!(port = dev.port_id(), error = %e, "port close failed");
            }
            info!(port = dev.port_id(), "port closed");
        }
    }
}

pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    /// `config` should already have passed [`BridgeConfig::validate`].
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run until `shutdown` is triggered (normally by SIGINT/SIGTERM).
    pub fn run<I, S>(&self, eal_args: I, stats: Arc<BridgeStats>, shutdown: ShutdownFlag) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _eal = Eal::init(eal_args).map_err(|errno| {
            error!(error = %rte_strerror(errno), "EAL init failed");
            Error::Dpdk {
                op: "rte_eal_init",
                errno,
            }
        })?;

        self.config.validate_ports(EthDev::count_avail())?;

        let t = &self.config.tunables;
        let pool_config = MemPoolConfig::new()
            .num_mbufs(t.pool_size)
            .cache_size(t.pool_cache_size)
            .socket_id(Eal::socket_id());
        let pool = Arc::new(MemPool::create(POOL_NAME, &pool_config).op("rte_pktmbuf_pool_create")?);
        info!(name = POOL_NAME, mbufs = t.pool_size, "mbuf pool created");

        let rings = self.create_rings()?;

        let plan = QueuePlan::assign(self.config.queues, Lcore::workers().map(|l| l.id()))?;
        for (lcore, queue) in plan.iter() {
            info!(lcore, queue, "queue assigned");
        }
        if !plan.idle_contexts().is_empty() {
            info!(lcores = ?plan.idle_contexts(), "lcores left idle");
        }

        let ports = self.start_ports(&pool)?;

        self.config.log_summary();
        if let Err(e) = install_signal_handler(&shutdown) {
            warn!(error = %e, "could not install signal handler");
        }
        let control = self.config.control_addr.and_then(|addr| {
            match ControlPlane::spawn(addr, stats.clone(), shutdown.clone()) {
                Ok(cp) => Some(cp),
                Err(e) => {
                    warn!(%addr, error = %e, "could not start control plane");
                    None
                }
            }
        });

        let mut result = self.launch_and_wait(&plan, &pool, rings.as_ref(), &stats, &shutdown);

        // workers are gone; make sure the control plane follows
        shutdown.trigger();
        if let Some(cp) = control {
            if let Err(e) = cp.join() {
                error!(error = %e, "control plane failed");
                result = result.and(Err(e));
            }
        }

        drop(ports);
        drop(rings);
        drop(pool);
        info!(stats = ?stats.snapshot(), "bridge stopped");
        result
    }

    fn create_rings(&self) -> Result<Option<Arc<RingSet<Ring>>>> {
        let OutputMode::Rings { prefix, .. } = &self.config.output else {
            return Ok(None);
        };
        let names = self.config.output.ring_names();
        let producer = ProducerMode::for_layout(names.len(), self.config.queues);
        if producer == ProducerMode::Multi {
            warn!(
                rings = names.len(),
                queues = self.config.queues,
                "ring count is not a power of two equal to the queue count; rings are multi-producer"
            );
        }

        let size = self.config.tunables.output_ring_size;
        let mut rings = Vec::with_capacity(names.len());
        for name in &names {
            rings.push(
                Ring::create(name, size, tapbr_sys::ffi::SOCKET_ID_ANY, producer)
                    .op("rte_ring_create")?,
            );
            info!(name = %name, size, ?producer, "ring created");
        }
        Ok(Some(Arc::new(RingSet::new(prefix.clone(), rings)?)))
    }

    fn start_ports(&self, pool: &MemPool) -> Result<StartedPorts> {
        let t = &self.config.tunables;
        let queues = self.config.queues;
        let mut started = StartedPorts(Vec::new());
        for port in self.config.used_ports() {
            let dev = EthDev::new(port);
            let (max_rx, max_tx) = dev.max_queues().op("rte_eth_dev_info_get")?;
            let max = max_rx.min(max_tx);
            if queues > max {
                return Err(Error::TooManyQueues {
                    port,
                    requested: queues,
                    max,
                });
            }
            info!(port, "initializing port");
            let dev = EthDevBuilder::new(port)
                .queues(queues)
                .descriptors(t.rx_desc as u16, t.tx_desc as u16)
                .promiscuous()
                .build(pool)
                .op("port bring-up")?;
            started.0.push(dev);
        }
        Ok(started)
    }

    fn make_loop(
        &self,
        queue: QueueId,
        pool: &Arc<MemPool>,
        rings: Option<&Arc<RingSet<Ring>>>,
        stats: &Arc<BridgeStats>,
    ) -> Result<DpdkLoop> {
        let [a, b] = self.config.primary;
        let mirror = match (&self.config.output, rings) {
            (_, Some(rings)) => MirrorTarget::Rings(rings.clone()),
            (OutputMode::Tap { port }, None) => MirrorTarget::Tap(EthQueue::new(*port, queue)),
            (OutputMode::Rings { .. }, None) => return Err(Error::NoRings),
        };
        ForwardLoop::new(
            queue,
            [EthQueue::new(a, queue), EthQueue::new(b, queue)],
            pool.clone(),
            Some(mirror),
            stats.clone(),
            self.config.tunables.burst_size as usize,
        )
    }

    fn launch_and_wait(
        &self,
        plan: &QueuePlan,
        pool: &Arc<MemPool>,
        rings: Option<&Arc<RingSet<Ring>>>,
        stats: &Arc<BridgeStats>,
        shutdown: &ShutdownFlag,
    ) -> Result<()> {
        let mut result = Ok(());
        let mut launched = Vec::new();
        for (id, queue) in plan.iter() {
            let lcore = Lcore::from_id(id);
            let mut fwd = match self.make_loop(queue, pool, rings, stats) {
                Ok(fwd) => fwd,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            let flag = shutdown.clone();
            let launch = lcore.launch(move || {
                fwd.run(&flag);
                0
            });
            match launch {
                Ok(()) => launched.push(lcore),
                Err(errno) => {
                    result = Err(Error::Dpdk {
                        op: "rte_eal_remote_launch",
                        errno,
                    });
                    break;
                }
            }
        }

        if result.is_err() {
            error!("worker launch failed, stopping launched workers");
            shutdown.trigger();
        } else {
            info!(workers = launched.len(), "bridge running");
        }

        for lcore in launched {
            let code = lcore.wait();
            if code != 0 {
                error!(lcore = lcore.id(), code, "worker failed");
                if result.is_ok() {
                    result = Err(Error::WorkerFailed {
                        lcore: lcore.id(),
                        code,
                    });
                }
            }
        }
        result
    }
}
