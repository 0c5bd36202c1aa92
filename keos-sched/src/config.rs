//! Boot-time configuration of the scheduler.
//!
//! The kernel command line selects the policy and tunes it:
//!
//! ```text
//! sched=lottery seed=7 trace=donate,dispatch quiet
//! ```
//!
//! | Option          | Meaning                                            |
//! |-----------------|----------------------------------------------------|
//! | `sched=<name>`  | `fifo`, `random`, `priority` or `lottery`          |
//! | `seed=<u64>`    | seed of the random number generator                |
//! | `trace=<flags>` | comma separated [`TraceFlags`], `all` or `none`    |
//! | `quiet`         | suppress `info!`, `warning!` and `debug!`          |

use crate::{
    KernelError,
    thread::{
        policy::{Fifo, Lottery, Priority, Random},
        scheduler::{DonationScheduler, Scheduler, set_boxed_scheduler},
    },
};
use alloc::boxed::Box;
use core::{str::FromStr, sync::atomic::Ordering};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Scheduling policy, as stored in the boot parameter block.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
pub enum Policy {
    /// Insertion order, no donation.
    Fifo = 0,
    /// Uniform draw, no donation.
    Random = 1,
    /// Highest effective priority first, max donation.
    Priority = 2,
    /// Weighted draw over tickets, additive donation.
    Lottery = 3,
}

impl Policy {
    /// Name of the policy on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Policy::Fifo => "fifo",
            Policy::Random => "random",
            Policy::Priority => "priority",
            Policy::Lottery => "lottery",
        }
    }
}

impl FromStr for Policy {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Policy::Fifo),
            "random" => Ok(Policy::Random),
            "priority" => Ok(Policy::Priority),
            "lottery" => Ok(Policy::Lottery),
            _ => Err(KernelError::InvalidArgument),
        }
    }
}

bitflags::bitflags! {
    /// Scheduler events written to the console with `debug!`.
    pub struct TraceFlags: u32 {
        /// A thread starts or stops waiting on a queue.
        const ENQUEUE = 1 << 0;
        /// A queue is handed to its next thread.
        const DISPATCH = 1 << 1;
        /// An effective priority changes.
        const DONATE = 1 << 2;
        /// A base priority changes.
        const PRIORITY = 1 << 3;
    }
}

impl FromStr for TraceFlags {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = TraceFlags::empty();
        for name in s.split(',').filter(|n| !n.is_empty()) {
            flags |= match name {
                "enqueue" => TraceFlags::ENQUEUE,
                "dispatch" => TraceFlags::DISPATCH,
                "donate" => TraceFlags::DONATE,
                "priority" => TraceFlags::PRIORITY,
                "all" => TraceFlags::all(),
                "none" => TraceFlags::empty(),
                _ => return Err(KernelError::InvalidArgument),
            };
        }
        Ok(flags)
    }
}

/// The [`SystemConfigurationBuilder`] collects the scheduler settings before
/// the scheduler is installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemConfigurationBuilder {
    policy: Policy,
    seed: u64,
    trace: TraceFlags,
    quiet: bool,
}

impl Default for SystemConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConfigurationBuilder {
    /// Default configuration: fifo, seed 0, no tracing, not quiet.
    pub const fn new() -> Self {
        Self {
            policy: Policy::Fifo,
            seed: 0,
            trace: TraceFlags::empty(),
            quiet: false,
        }
    }

    /// Sets the scheduling policy.
    pub fn set_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the seed of the randomized policies.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets which scheduler events are traced.
    pub fn set_trace(mut self, trace: TraceFlags) -> Self {
        self.trace = trace;
        self
    }

    /// Silences the console macros.
    pub fn set_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// The configured policy.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The configured seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The configured trace flags.
    pub fn trace(&self) -> TraceFlags {
        self.trace
    }

    /// Whether the console is silenced.
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Apply the options of a kernel command line.
    ///
    /// Unknown options are reported and skipped.
    ///
    /// # Errors
    /// [`KernelError::InvalidArgument`] if a known option has a malformed
    /// value.
    pub fn parse_cmdline(mut self, cmdline: &str) -> Result<Self, KernelError> {
        for arg in cmdline.split_whitespace() {
            let (key, value) = match arg.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (arg, None),
            };
            match (key, value) {
                ("sched", Some(value)) => self.policy = value.parse()?,
                ("seed", Some(value)) => {
                    self.seed = value.parse().map_err(|_| KernelError::InvalidArgument)?
                }
                ("trace", Some(value)) => self.trace = value.parse()?,
                ("quiet", None) => self.quiet = true,
                ("sched" | "seed" | "trace", None) | ("quiet", Some(_)) => {
                    return Err(KernelError::InvalidArgument);
                }
                _ => warning!("Config: ignoring unknown option `{arg}`."),
            }
        }
        Ok(self)
    }

    /// Create the configured scheduler.
    pub fn build(&self) -> Box<dyn Scheduler + Send> {
        match self.policy {
            Policy::Fifo => Box::new(DonationScheduler::new(Fifo).with_trace(self.trace)),
            Policy::Random => {
                Box::new(DonationScheduler::new(Random::new(self.seed)).with_trace(self.trace))
            }
            Policy::Priority => Box::new(DonationScheduler::new(Priority).with_trace(self.trace)),
            Policy::Lottery => {
                Box::new(DonationScheduler::new(Lottery::new(self.seed)).with_trace(self.trace))
            }
        }
    }

    /// Build the scheduler and make it the kernel scheduler, returning the
    /// one it replaces.
    pub fn install(self) -> Option<Box<dyn Scheduler + Send>> {
        abyss::QUIET.store(self.quiet, Ordering::SeqCst);
        info!(
            "Scheduler: {} (seed {}, trace {:?}).",
            self.policy.name(),
            self.seed,
            self.trace
        );
        set_boxed_scheduler(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_boot_value() {
        assert_eq!(Policy::try_from(3u8).ok(), Some(Policy::Lottery));
        assert_eq!(Policy::try_from(0u8).ok(), Some(Policy::Fifo));
        assert!(Policy::try_from(4u8).is_err());
        assert_eq!(u8::from(Policy::Priority), 2);
    }

    #[test]
    fn policy_names_round_trip() {
        for policy in [Policy::Fifo, Policy::Random, Policy::Priority, Policy::Lottery] {
            assert_eq!(policy.name().parse::<Policy>(), Ok(policy));
        }
        assert_eq!("stride".parse::<Policy>(), Err(KernelError::InvalidArgument));
    }

    #[test]
    fn parse_full_cmdline() {
        let conf = SystemConfigurationBuilder::new()
            .parse_cmdline("sched=lottery seed=7 trace=donate,dispatch quiet")
            .unwrap();
        assert_eq!(conf.policy(), Policy::Lottery);
        assert_eq!(conf.seed(), 7);
        assert_eq!(conf.trace(), TraceFlags::DONATE | TraceFlags::DISPATCH);
        assert!(conf.quiet());
        assert_eq!(conf.build().policy_name(), "lottery");
        assert_eq!(conf.build().priority_range(), (1, 7));
    }

    #[test]
    fn unknown_options_are_skipped() {
        let conf = SystemConfigurationBuilder::new()
            .parse_cmdline("console=ttyS0 sched=priority  ")
            .unwrap();
        assert_eq!(conf.policy(), Policy::Priority);
        assert_eq!(conf.trace(), TraceFlags::empty());
    }

    #[test]
    fn malformed_values_are_rejected() {
        for cmdline in ["seed=-1", "sched=", "trace=donate,bogus", "seed", "quiet=1"] {
            assert_eq!(
                SystemConfigurationBuilder::new().parse_cmdline(cmdline),
                Err(KernelError::InvalidArgument),
                "{cmdline}"
            );
        }
    }

    #[test]
    fn trace_all_and_none() {
        assert_eq!("all".parse::<TraceFlags>(), Ok(TraceFlags::all()));
        assert_eq!("none".parse::<TraceFlags>(), Ok(TraceFlags::empty()));
        assert_eq!("".parse::<TraceFlags>(), Ok(TraceFlags::empty()));
    }
}
