//! Cooperative, single-threaded frame loop.
//!
//! The close flag lives in [`LoopContext`], which the platform's event
//! handling receives by `&mut` on the same thread that runs the loop.

use log::info;

#[derive(Debug, Default)]
pub struct LoopContext {
    close_requested: bool,
}

impl LoopContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

/// Window-system side of the loop.
pub trait Platform {
    type Error;

    /// Handles pending events, setting the close flag on window close or Escape.
    fn poll_events(&mut self, ctx: &mut LoopContext);

    fn present(&mut self) -> Result<(), Self::Error>;
}

/// Poll, draw, present until the close flag is set.
///
/// Returns the number of frames presented. An error from `on_frame` or from
/// presenting stops the loop.
pub fn run<P, F>(platform: &mut P, ctx: &mut LoopContext, mut on_frame: F) -> Result<u64, P::Error>
where
    P: Platform,
    F: FnMut() -> Result<(), P::Error>,
{
    let mut frames = 0;

    while !ctx.close_requested() {
        platform.poll_events(ctx);
        on_frame()?;
        platform.present()?;
        frames += 1;
    }

    info!("Frame loop finished after {frames} frames");

    Ok(frames)
}

/// Calls `on_frame` until `should_stop` returns true. Returns the frame count.
pub fn run_until<S, F>(mut should_stop: S, mut on_frame: F) -> u64
where
    S: FnMut() -> bool,
    F: FnMut(),
{
    let mut frames = 0;

    while !should_stop() {
        on_frame();
        frames += 1;
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakePlatform {
        polls: u32,
        presents: u32,
        close_after: u32,
        fail_present_at: Option<u32>,
        log: Vec<&'static str>,
    }

    impl Platform for FakePlatform {
        type Error = String;

        fn poll_events(&mut self, ctx: &mut LoopContext) {
            self.polls += 1;
            self.log.push("poll");
            if self.polls >= self.close_after {
                ctx.request_close();
            }
        }

        fn present(&mut self) -> Result<(), String> {
            self.presents += 1;
            self.log.push("present");
            if Some(self.presents) == self.fail_present_at {
                return Err("swap failed".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn stops_after_close_is_requested() {
        let mut platform = FakePlatform {
            close_after: 3,
            ..Default::default()
        };
        let mut ctx = LoopContext::new();
        let mut drawn = 0;

        let frames = run(&mut platform, &mut ctx, || {
            drawn += 1;
            Ok(())
        })
        .unwrap();

        // the frame in which close was requested is still finished
        assert_eq!(frames, 3);
        assert_eq!(drawn, 3);
        assert_eq!(platform.presents, 3);
        assert!(ctx.close_requested());
    }

    #[test]
    fn poll_draw_present_order() {
        let mut platform = FakePlatform {
            close_after: 2,
            ..Default::default()
        };
        let mut ctx = LoopContext::new();

        run(&mut platform, &mut ctx, || Ok(())).unwrap();

        assert_eq!(platform.log, vec!["poll", "present", "poll", "present"]);
    }

    #[test]
    fn already_closed_context_runs_no_frames() {
        let mut platform = FakePlatform::default();
        let mut ctx = LoopContext::new();
        ctx.request_close();

        let frames = run(&mut platform, &mut ctx, || Ok(())).unwrap();

        assert_eq!(frames, 0);
        assert_eq!(platform.polls, 0);
    }

    #[test]
    fn present_error_ends_loop() {
        let mut platform = FakePlatform {
            close_after: 10,
            fail_present_at: Some(2),
            ..Default::default()
        };
        let mut ctx = LoopContext::new();

        let res = run(&mut platform, &mut ctx, || Ok(()));

        assert_eq!(res, Err("swap failed".to_string()));
        assert_eq!(platform.polls, 2);
    }

    #[test]
    fn frame_error_skips_present() {
        let mut platform = FakePlatform {
            close_after: 10,
            ..Default::default()
        };
        let mut ctx = LoopContext::new();

        let res = run(&mut platform, &mut ctx, || Err("draw failed".to_string()));

        assert_eq!(res, Err("draw failed".to_string()));
        assert_eq!(platform.presents, 0);
    }

    #[test]
    fn run_until_counts_frames() {
        let mut remaining = 4;
        let mut drawn = 0;

        let frames = run_until(
            || {
                remaining -= 1;
                remaining < 0
            },
            || drawn += 1,
        );

        assert_eq!(frames, 4);
        assert_eq!(drawn, 4);
    }
}
