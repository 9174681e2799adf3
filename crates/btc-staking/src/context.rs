//! The staking context and its block lifecycle.
//!
//! The host drives a [`StakingContext`] one block at a time:
//!
//! 1. [`StakingContext::begin_block`] advances the epoch and indexes the block.
//! 2. [`StakingContext::deliver`] executes the block's messages in order.
//! 3. [`StakingContext::end_block`] checks liveness, finalizes blocks, commits every write of the
//!    block to the store and dispatches the block's events.
//!
//! All writes of a block are buffered in a [`WriteSet`]. Every message runs in a nested write set
//! that is folded into the block's only if the message is accepted, so a rejected message leaves
//! no trace. A fatal error discards the block as a whole.

use std::fmt;

use bitcoin::block::Header;
use btc_staking_db::{KvStore, Overlay, WriteSet};
use btc_staking_epoching::epoch;
use btc_staking_light_client::BtcLightClient;
use btc_staking_params::Params;
use btc_staking_primitives::types::{AppHash, BitcoinBlockHeight, BlockHeight, BlockTime};
use btc_staking_voting_power::PowerTable;
use tracing::{debug, error, info, warn};

use crate::{
    errors::{StakingError, StakingResult},
    events::{EventListener, StakingEvent},
    handlers, hooks,
    msgs::Msg,
    power::refresh_power_table,
};

/// Everything a message handler or block hook may touch.
pub(crate) struct BlockCtx<'a, S: ?Sized> {
    /// The state as seen from within the block.
    pub(crate) store: &'a mut S,

    /// The chain parameters.
    pub(crate) params: &'a Params,

    /// The BTC light client.
    pub(crate) light_client: &'a BtcLightClient,

    /// Height of the block being executed.
    pub(crate) height: BlockHeight,

    /// Time of the block being executed.
    pub(crate) time: BlockTime,

    events: &'a mut Vec<StakingEvent>,
}

impl<S: KvStore + ?Sized> BlockCtx<'_, S> {
    /// Queues `event` for dispatch once the block commits.
    pub(crate) fn emit(&mut self, event: StakingEvent) {
        debug!(?event, "emitting event");
        self.events.push(event);
    }

    /// Recomputes the voting power table from the current height on.
    pub(crate) fn refresh_power(&mut self) -> StakingResult<PowerTable> {
        refresh_power_table(self.store, self.height)
    }
}

/// The block being executed.
#[derive(Debug)]
struct BlockState {
    height: BlockHeight,
    time: BlockTime,
    writes: WriteSet,
    events: Vec<StakingEvent>,
}

impl BlockState {
    fn new(height: BlockHeight, time: BlockTime) -> Self {
        Self {
            height,
            time,
            writes: WriteSet::new(),
            events: Vec::new(),
        }
    }
}

/// The BTC staking and finality state machine.
///
/// Holds the store, the parameters and the registered event listeners. There is no other state:
/// two contexts over equal stores with equal parameters behave identically.
pub struct StakingContext<S> {
    pub(crate) store: S,
    pub(crate) params: Params,
    pub(crate) light_client: BtcLightClient,
    listeners: Vec<Box<dyn EventListener>>,
    block: Option<BlockState>,
}

impl<S: fmt::Debug> fmt::Debug for StakingContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StakingContext")
            .field("store", &self.store)
            .field("params", &self.params)
            .field("listeners", &self.listeners.len())
            .field("block", &self.block.as_ref().map(|block| block.height))
            .finish()
    }
}

impl<S: KvStore> StakingContext<S> {
    /// Creates a context over `store`.
    pub fn new(store: S, params: Params) -> StakingResult<Self> {
        params.validate()?;

        let light_client = BtcLightClient::new(params.staking.network);

        Ok(Self {
            store,
            params,
            light_client,
            listeners: Vec::new(),
            block: None,
        })
    }

    /// Registers a listener for committed events.
    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Sets up a fresh store: the base of the BTC header chain and the genesis epoch.
    pub fn init_genesis(
        &mut self,
        base_header: Header,
        base_height: BitcoinBlockHeight,
    ) -> StakingResult<()> {
        if let Some(block) = &self.block {
            return Err(StakingError::BlockAlreadyOpen(block.height));
        }

        let mut writes = WriteSet::new();
        let result = {
            let mut view = Overlay::new(&self.store, &mut writes);
            self.write_genesis(&mut view, base_header, base_height)
        };

        if let Err(e) = result {
            writes.discard();
            return Err(e);
        }
        writes.commit(&mut self.store)?;

        info!(base = %base_header.block_hash(), %base_height, "initialized staking state");

        Ok(())
    }

    fn write_genesis<T: KvStore + ?Sized>(
        &self,
        store: &mut T,
        base_header: Header,
        base_height: BitcoinBlockHeight,
    ) -> StakingResult<()> {
        self.light_client.init_base(store, base_header, base_height)?;
        epoch::init_genesis(store, &self.params.epoching)?;

        Ok(())
    }

    /// Opens the block at `height`.
    pub fn begin_block(
        &mut self,
        height: BlockHeight,
        time: BlockTime,
        app_hash: AppHash,
    ) -> StakingResult<()> {
        if let Some(block) = &self.block {
            return Err(StakingError::BlockAlreadyOpen(block.height));
        }

        let mut block = BlockState::new(height, time);
        let result = {
            let mut view = Overlay::new(&self.store, &mut block.writes);
            let mut ctx = BlockCtx {
                store: &mut view,
                params: &self.params,
                light_client: &self.light_client,
                height,
                time,
                events: &mut block.events,
            };

            hooks::begin_block(&mut ctx, app_hash)
        };

        match result {
            Ok(()) => {
                debug!(%height, %time, %app_hash, "began block");
                self.block = Some(block);

                Ok(())
            }
            Err(e) => {
                error!(%height, %e, "could not begin block");
                block.writes.discard();

                Err(e)
            }
        }
    }

    /// Executes `msg` within the open block.
    ///
    /// A rejected message leaves the state untouched. If the error is fatal, the whole block is
    /// discarded as well.
    pub fn deliver(&mut self, msg: impl Into<Msg>) -> StakingResult<()> {
        let msg = msg.into();
        let kind = msg.kind();
        let block = self.block.as_mut().ok_or(StakingError::NoOpenBlock)?;
        let (height, time) = (block.height, block.time);

        let mut msg_writes = WriteSet::new();
        let mut msg_events = Vec::new();
        let result = {
            let block_view = Overlay::new(&self.store, &mut block.writes);
            let mut view = Overlay::new(&block_view, &mut msg_writes);
            let mut ctx = BlockCtx {
                store: &mut view,
                params: &self.params,
                light_client: &self.light_client,
                height,
                time,
                events: &mut msg_events,
            };

            handlers::handle(&mut ctx, msg)
        };

        match result {
            Ok(()) => {
                msg_writes.commit(&mut Overlay::new(&self.store, &mut block.writes))?;
                block.events.extend(msg_events);
                debug!(%kind, %height, "executed message");

                Ok(())
            }
            Err(e) if e.is_fatal() => {
                msg_writes.discard();
                error!(%kind, %height, %e, "fatal error, discarding block");
                self.abort_block();

                Err(e)
            }
            Err(e) => {
                msg_writes.discard();
                warn!(%kind, %height, %e, "rejected message");

                Err(e)
            }
        }
    }

    /// Closes the open block, commits its writes and dispatches its events.
    ///
    /// Returns the dispatched events.
    pub fn end_block(&mut self) -> StakingResult<Vec<StakingEvent>> {
        let mut block = self.block.take().ok_or(StakingError::NoOpenBlock)?;

        let result = {
            let mut view = Overlay::new(&self.store, &mut block.writes);
            let mut ctx = BlockCtx {
                store: &mut view,
                params: &self.params,
                light_client: &self.light_client,
                height: block.height,
                time: block.time,
                events: &mut block.events,
            };

            hooks::end_block(&mut ctx)
        };

        if let Err(e) = result {
            error!(height = block.height, %e, "could not end block, discarding it");
            block.writes.discard();

            return Err(e);
        }

        let BlockState {
            height,
            writes,
            events,
            ..
        } = block;
        writes.commit(&mut self.store)?;

        for event in &events {
            for listener in &mut self.listeners {
                listener.on_event(event);
            }
        }

        info!(%height, num_events = events.len(), "committed block");

        Ok(events)
    }

    /// Discards the open block, if any.
    pub fn abort_block(&mut self) {
        if let Some(block) = self.block.take() {
            warn!(height = block.height, "aborting block");
            block.writes.discard();
        }
    }

    /// Returns the height of the open block.
    pub fn open_block(&self) -> Option<BlockHeight> {
        self.block.as_ref().map(|block| block.height)
    }

    /// Returns the parameters.
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the committed state.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the context and returns the committed state.
    pub fn into_store(self) -> S {
        self.store
    }
}
