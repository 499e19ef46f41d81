//! Section scheduler.
//!
//! Walks the rung chain of one section, honouring jumps and subroutine
//! calls. Calls use an explicit fixed-depth stack; nothing recurses.
//!
//! A call made on the caller's last rung pushes a frame without a resume
//! rung. Popping such a frame means the caller has nothing left to run: a
//! main section is then done, a subroutine caller returns in turn.

use crate::evaluator::{evaluate, JumpOrCall};
use crate::registry::Registry;
use crate::section::{Language, Program};
use ladder_common::vars::VariableStore;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use thiserror::Error;
use tracing::trace_span;

/// Maximum subroutine nesting.
pub const CALL_STACK_DEPTH: usize = 25;

const_assert!(CALL_STACK_DEPTH > 0);

/// How a scan fault is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultSeverity {
    /// The faulty section is abandoned for this cycle; other sections run.
    Structural,
    /// The engine stops and enters FAULT.
    ResourceExhaustion,
}

/// Faults detected while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanFault {
    /// A jump coil targets a rung that is not in use.
    #[error("section {section} rung {rung}: jump to unused rung {target}")]
    UndefinedJumpTarget {
        /// Section being scanned.
        section: usize,
        /// Rung holding the jump.
        rung: usize,
        /// Requested target.
        target: usize,
    },
    /// Too many jumps in one cycle.
    #[error("section {section} rung {rung}: more than {limit} jumps in one cycle")]
    RunawayLoop {
        /// Section being scanned.
        section: usize,
        /// Rung holding the last jump.
        rung: usize,
        /// Configured bound.
        limit: u32,
    },
    /// A call would exceed the call stack depth.
    #[error("section {section} rung {rung}: too many nested calls calling SR{subroutine}")]
    CallStackOverflow {
        /// Section being scanned.
        section: usize,
        /// Rung holding the call.
        rung: usize,
        /// Requested subroutine.
        subroutine: u32,
    },
    /// A subroutine ended with no caller on the stack.
    #[error("section {section}: return without call")]
    ReturnWithoutCall {
        /// Subroutine section that ended.
        section: usize,
    },
    /// A call names no used ladder subroutine section.
    #[error("section {section} rung {rung}: call to undefined subroutine SR{subroutine}")]
    UndefinedSubroutine {
        /// Section being scanned.
        section: usize,
        /// Rung holding the call.
        rung: usize,
        /// Requested subroutine.
        subroutine: u32,
    },
    /// The rung chain reaches an unused rung or never reaches the last rung.
    #[error("section {section}: broken rung chain at rung {rung}")]
    BrokenChain {
        /// Section being scanned.
        section: usize,
        /// Offending rung index.
        rung: usize,
    },
}

impl ScanFault {
    /// Handling policy for this fault.
    #[must_use]
    pub fn severity(&self) -> FaultSeverity {
        match self {
            Self::RunawayLoop { .. } | Self::CallStackOverflow { .. } => {
                FaultSeverity::ResourceExhaustion
            }
            _ => FaultSeverity::Structural,
        }
    }
}

/// A saved caller position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallFrame {
    /// Calling section.
    pub section: usize,
    /// Rung to resume at; `None` when the call was on the caller's last rung.
    pub resume: Option<usize>,
}

/// Fixed-depth call stack.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: [CallFrame; CALL_STACK_DEPTH],
    len: usize,
}

impl CallStack {
    /// Push a frame; `false` when full.
    pub fn push(&mut self, frame: CallFrame) -> bool {
        match self.frames.get_mut(self.len) {
            Some(slot) => {
                *slot = frame;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    /// Pop the most recent frame.
    pub fn pop(&mut self) -> Option<CallFrame> {
        self.len = self.len.checked_sub(1)?;
        Some(self.frames[self.len])
    }

    /// Current depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.len
    }

    /// Drop every frame.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

/// Per-engine scheduler state: call stack and the per-cycle jump budget.
#[derive(Debug, Clone)]
pub struct SectionScheduler {
    stack: CallStack,
    jumps: u32,
    max_jumps: u32,
}

impl SectionScheduler {
    /// Create a scheduler allowing `max_jumps` jumps per cycle.
    #[must_use]
    pub fn new(max_jumps: u32) -> Self {
        Self {
            stack: CallStack::default(),
            jumps: 0,
            max_jumps,
        }
    }

    /// Reset the jump budget; call once per cycle.
    pub fn begin_cycle(&mut self) {
        self.jumps = 0;
        self.stack.clear();
    }

    /// Jumps taken so far this cycle.
    #[must_use]
    pub fn jumps(&self) -> u32 {
        self.jumps
    }

    /// Scan one section to completion.
    ///
    /// Sections in another language are skipped. On a fault, the section is
    /// abandoned at the faulty rung and the call stack is emptied.
    pub fn scan_section<S: VariableStore + ?Sized>(
        &mut self,
        start: usize,
        program: &mut Program,
        registry: &mut Registry,
        store: &mut S,
    ) -> Result<(), ScanFault> {
        self.stack.clear();
        let result = self.run(start, program, registry, store);
        self.stack.clear();
        result
    }

    fn run<S: VariableStore + ?Sized>(
        &mut self,
        start: usize,
        program: &mut Program,
        registry: &mut Registry,
        store: &mut S,
    ) -> Result<(), ScanFault> {
        let Some(first) = program.sections.get(start) else {
            return Err(ScanFault::BrokenChain { section: start, rung: 0 });
        };
        if !first.used || first.language != Language::Ladder {
            return Ok(());
        }

        let mut section = start;
        let mut rung = first.first_rung;
        // Rungs walked since the last jump, call or return.
        let mut walked = 0usize;

        loop {
            walked += 1;
            if !program.rung_used(rung) || walked > program.rungs.len() {
                return Err(ScanFault::BrokenChain { section, rung });
            }

            let action = {
                let _span = trace_span!("rung", section, rung).entered();
                evaluate(&mut program.rungs[rung], store, registry)
            };
            let current = &program.sections[section];

            match action {
                Some(JumpOrCall::Jump(target)) => {
                    self.jumps += 1;
                    if self.jumps > self.max_jumps {
                        return Err(ScanFault::RunawayLoop {
                            section,
                            rung,
                            limit: self.max_jumps,
                        });
                    }
                    if !program.rung_used(target) {
                        return Err(ScanFault::UndefinedJumpTarget { section, rung, target });
                    }
                    rung = target;
                    walked = 0;
                    continue;
                }
                Some(JumpOrCall::Call(subroutine)) => {
                    let callee = program
                        .find_subroutine(subroutine)
                        .filter(|&s| program.sections[s].language == Language::Ladder)
                        .ok_or(ScanFault::UndefinedSubroutine { section, rung, subroutine })?;
                    let resume = if rung == current.last_rung {
                        None
                    } else {
                        let next = program.rungs[rung].next;
                        Some(next.ok_or(ScanFault::BrokenChain { section, rung })?)
                    };
                    if !self.stack.push(CallFrame { section, resume }) {
                        return Err(ScanFault::CallStackOverflow { section, rung, subroutine });
                    }
                    section = callee;
                    rung = program.sections[callee].first_rung;
                    walked = 0;
                    continue;
                }
                None => {}
            }

            if rung != current.last_rung {
                rung = program.rungs[rung]
                    .next
                    .ok_or(ScanFault::BrokenChain { section, rung })?;
                continue;
            }

            if current.is_main() {
                return Ok(());
            }

            // End of a subroutine: return to the nearest caller with work left.
            loop {
                let frame = self
                    .stack
                    .pop()
                    .ok_or(ScanFault::ReturnWithoutCall { section })?;
                if let Some(resume) = frame.resume {
                    section = frame.section;
                    rung = resume;
                    walked = 0;
                    break;
                }
                if program.sections[frame.section].is_main() {
                    return Ok(());
                }
                section = frame.section;
            }
        }
    }
}
