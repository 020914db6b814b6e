use crate::config::Config;
use crate::key::{Decoder, Key};
use crate::os_glue::{Glue, Port};
use crate::pace::{strip_flow_control, Pacer};
use crate::termout::{Features, TermOut};
use log::{debug, error, info};
use stakker::{after, fwd, timer_max, Fwd, MaxTimerKey, Share, CX};
use std::error::Error;
use std::mem;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use std::time::Duration;

/// Actor that manages the connection to the terminal
pub struct Terminal {
    output: Fwd<Option<Share<TermOut>>>,
    input: Fwd<Key>,
    termout: Share<TermOut>,
    glue: Glue,
    decoder: Decoder,
    pacer: Pacer,
    flow_control: bool,
    // Inhibit sources: XOFF from the terminal, or a write that would block
    xoff: bool,
    blocked: bool,
    // A paced chunk delay is running
    pumping: bool,
    disable_output: bool,
    closed: bool,
    force_timer: MaxTimerKey,
    cleanup: Vec<u8>,
    panic_hook: Arc<Box<dyn Fn(&PanicHookInfo<'_>) + 'static + Sync + Send>>,
}

impl Terminal {
    /// Set up the terminal described by `config`: stdin/stdout, or a
    /// serial device at the configured line speed.  Sends a message
    /// back to `output` immediately, which provides a reference to
    /// the shared [`TermOut`] which is used to buffer and flush
    /// terminal output data.  That first message is also the signal
    /// to paint the whole screen.  When the terminal goes away,
    /// `None` is sent to `output`.
    ///
    /// Input keys received are sent to `input` once decoded.  With
    /// flow control on, XON/XOFF bytes are taken out of the input
    /// and used to stop and restart output instead.
    ///
    /// In case of an error that can't be handled (including a hangup
    /// or end of input), cleans up the terminal state and terminates
    /// the actor with `ActorDied::Failed`.  The actor that created
    /// the terminal can catch that and do whatever cleanup is
    /// necessary before aborting the process.
    ///
    /// # Panic handling
    ///
    /// When Rust panics, the terminal must be restored to its normal
    /// state otherwise things would be left in a bad state for the
    /// user (in cooked mode with no echo, requiring the user to
    /// blindly type `reset` on the command-line).  So this code saves
    /// a copy of the current panic handler (using
    /// `std::panic::take_hook`), and then installs its own handler
    /// that does terminal cleanup before calling on to the saved
    /// panic handler.  This mean that if any custom panic handler is
    /// needed by the application, then it must be set up before the
    /// call to [`Terminal::init`].
    ///
    /// [`TermOut`]: struct.TermOut.html
    pub fn init(
        cx: CX![],
        config: Config,
        output: Fwd<Option<Share<TermOut>>>,
        input: Fwd<Key>,
    ) -> Option<Self> {
        let port = Port {
            path: config.port.clone(),
            baud: config.baud,
            flow_control: config.flow_control,
        };
        let term = cx.this().clone();
        let glue = match Glue::new(cx, term, &port) {
            Ok(v) => v,
            Err(e) => {
                error!("unable to open terminal: {}", e);
                cx.fail(e);
                return None;
            }
        };
        match &port.path {
            Some(path) => info!("terminal on {} at {} baud", path.display(), port.baud),
            None => info!("terminal on stdin/stdout"),
        }
        let features = Features { utf8: config.utf8 };
        let geometry = config.geometry();
        let termout = Share::new(cx, TermOut::new(features, (geometry.rows, geometry.columns)));
        // Pacing is only worth it where the line is slower than us
        let paced = config.flow_control || port.path.is_some();
        let mut this = Self {
            output,
            input,
            termout,
            glue,
            decoder: Decoder::new(),
            pacer: Pacer::new(paced, config.pacing_chunk, config.baud),
            flow_control: config.flow_control,
            xoff: false,
            blocked: false,
            pumping: false,
            disable_output: false,
            closed: false,
            force_timer: MaxTimerKey::default(),
            cleanup: b"\x1Bc".to_vec(),
            panic_hook: Arc::new(std::panic::take_hook()),
        };
        fwd!([this.output], Some(this.termout.clone()));
        this.update_panic_hook();
        Some(this)
    }

    /// Ring the bell (i.e. beep).  This goes out in order with the
    /// rest of the output.
    pub fn bell(&mut self, cx: CX![]) {
        if !self.disable_output {
            self.pacer.queue(b"\x07");
            self.pump(cx);
        }
    }

    // Handle an unrecoverable failure.  Try to clean up before
    // terminating the actor.
    fn failure(&mut self, cx: CX![], e: impl Error + 'static) {
        error!("terminal failure: {}", e);
        self.close(cx);
        cx.fail(e);
    }

    // Stop input and output, and put the terminal back as it was
    fn close(&mut self, cx: CX![]) {
        if !self.closed {
            fwd!([self.output], None);
            self.glue.input(false);
            self.pacer.discard();
            self.termout.rw(cx).discard();
            if !self.disable_output {
                let _ = self.glue.write_some(&self.cleanup[..]);
            }
            self.closed = true;
            self.update_panic_hook();
        }
    }

    /// Flush to the terminal all the data that's ready for sending
    /// from the TermOut buffer.  Use [`TermOut::flush`] first to mark
    /// the point up to which data should be flushed.  The data is
    /// queued and written out as fast as the line and flow control
    /// allow.
    ///
    /// [`TermOut::flush`]: struct.TermOut.html#method.flush
    pub fn flush(&mut self, cx: CX![]) {
        if self.termout.rw(cx).new_cleanup.is_some() {
            // Don't replace unless we're sure there's a new value
            if let Some(cleanup) = mem::replace(&mut self.termout.rw(cx).new_cleanup, None) {
                self.cleanup = cleanup;
                self.update_panic_hook();
            }
        }

        let ob = self.termout.rw(cx);
        if self.disable_output || self.closed {
            ob.drain_flush();
        } else {
            self.pacer.queue(ob.data_to_flush());
            ob.drain_flush();
            self.pump(cx);
        }
    }

    // Write out as much queued data as is allowed right now.  Paced
    // output writes one chunk and comes back after the time the line
    // takes to send it.
    fn pump(&mut self, cx: CX![]) {
        if self.disable_output || self.pumping {
            return;
        }
        while let Some(chunk) = self.pacer.next_chunk() {
            let len = chunk.len();
            match self.glue.write_some(chunk) {
                Err(e) => {
                    self.disable_output = true;
                    self.failure(cx, e);
                    return;
                }
                Ok(count) => {
                    self.pacer.consumed(count);
                    if count < len {
                        debug!("output blocked with {} bytes queued", self.pacer.pending());
                        self.blocked = true;
                        self.update_inhibit(cx);
                        return;
                    }
                    if self.pacer.is_paced() {
                        self.pumping = true;
                        after!(self.pacer.chunk_delay(count), [cx], pump_resume());
                        return;
                    }
                }
            }
        }
    }

    fn pump_resume(&mut self, cx: CX![]) {
        self.pumping = false;
        self.pump(cx);
    }

    fn update_inhibit(&mut self, cx: CX![]) {
        let on = self.xoff || self.blocked;
        if on != self.pacer.is_inhibited() {
            self.pacer.inhibit(on);
            if !on {
                self.pump(cx);
            }
        }
    }

    /// Handle the output becoming writable again
    pub(crate) fn handle_writable(&mut self, cx: CX![]) {
        if self.blocked {
            self.blocked = false;
            self.update_inhibit(cx);
        }
    }

    /// Handle a hangup or termination signal
    pub(crate) fn handle_hangup(&mut self, cx: CX![]) {
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Terminal hung up");
        self.disable_output = true;
        self.failure(cx, err);
    }

    /// Handle an I/O error on the TTY input
    pub(crate) fn handle_error_in(&mut self, cx: CX![], err: std::io::Error) {
        self.failure(cx, err);
    }

    /// Handle new bytes from the TTY input
    pub(crate) fn handle_data_in(&mut self, cx: CX![]) {
        let mut data = Vec::new();
        self.glue.read_data(&mut data);
        if self.flow_control {
            if let Some(xoff) = strip_flow_control(&mut data) {
                debug!("terminal sent {}", if xoff { "XOFF" } else { "XON" });
                self.xoff = xoff;
                self.update_inhibit(cx);
            }
        }
        self.decoder.push(&data);
        self.do_data_in(cx, false);
    }

    fn do_data_in(&mut self, cx: CX![], force: bool) {
        for key in self.decoder.keys(force) {
            fwd!([self.input], key);
        }
        if self.decoder.has_pending() {
            // A lone Esc is only known to be a keypress once nothing
            // has followed it for a while
            timer_max!(
                &mut self.force_timer,
                cx.now() + Duration::from_millis(100),
                [cx],
                do_data_in(true)
            );
        }
    }

    // Install a panic hook that (if necessary) outputs the current
    // cleanup string, restores cooked mode and then does the default
    // panic action (e.g. dump out backtrace).  This should be called
    // every time we switch to/from raw mode, and every time the
    // cleanup string is changed.
    fn update_panic_hook(&mut self) {
        // Discard old hook
        let _ = std::panic::take_hook();

        let defhook = self.panic_hook.clone();
        if self.closed {
            std::panic::set_hook(Box::new(move |info| defhook(info)));
        } else {
            let cleanup_fn = self.glue.cleanup_fn();
            let cleanup = self.cleanup.clone();

            std::panic::set_hook(Box::new(move |info| {
                cleanup_fn(&cleanup[..]);
                defhook(info);
            }));
        }
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        // Drop panic hook and clean up terminal
        let _ = std::panic::take_hook();
        if !self.closed {
            self.glue.cleanup_fn()(&self.cleanup[..]);
        }
    }
}
