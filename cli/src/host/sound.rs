/// Buzzer frequency, in hertz
const PITCH: u16 = 440;

/// Buzzer driven by the sound timer, once per frame
pub trait Sound {
    fn start(&mut self) -> anyhow::Result<()>;
    fn stop(&mut self) -> anyhow::Result<()>;
}

/// Plays through the PC speaker
#[derive(Debug, Default)]
pub struct Beeper {
    active: bool,
}

impl Sound for Beeper {
    fn start(&mut self) -> anyhow::Result<()> {
        if !self.active {
            beep::beep(PITCH)?;
            self.active = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        if self.active {
            beep::beep(0)?;
            self.active = false;
        }
        Ok(())
    }
}

impl Drop for Beeper {
    fn drop(&mut self) {
        let _ = beep::beep(0);
    }
}

/// Discards every beep
#[derive(Debug, Default)]
pub struct Mute;

impl Sound for Mute {
    fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
