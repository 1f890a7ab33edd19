use embedded_hal::digital::{Error, ErrorType, InputPin, OutputPin};

/// Access to the physical 1-Wire line.
///
/// The line is open-drain: [`set_low`](IoWire::set_low) pulls it down,
/// [`set_high`](IoWire::set_high) releases it to the pull-up resistor.
pub trait IoWire {
    type Error: Error;

    /// Is the line high?
    fn is_high(&mut self) -> Result<bool, Self::Error>;

    /// Is the line low?
    fn is_low(&mut self) -> Result<bool, Self::Error>;

    /// Drives the line low
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Releases the line
    ///
    /// *NOTE* the line only reads high once every device released it as well
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

/// Wirings able to actively drive the line high, powering parasitic devices
/// through the bus.
///
/// A plain open-drain pin cannot do this, implement it for a wrapper around a
/// pin that can be switched to push-pull, or use the `(I, O, P)` wiring.
pub trait StrongPullup: IoWire {
    /// Drives the released line high, or returns it to open-drain.
    /// Driving the line low must disable the strong pull-up first.
    fn set_strong_pullup(&mut self, enable: bool) -> Result<(), Self::Error>;
}

/// Single open-drain pin
impl<IO> IoWire for (IO,)
where
    IO: ErrorType + OutputPin + InputPin,
{
    type Error = IO::Error;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }
}

/// Separate input and output pins
impl<E, I, O> IoWire for (I, O)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.1.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}

/// Separate input and output pins plus a pin switching a strong pull-up
/// (e.g. a P-MOSFET to VCC), high enables it
impl<E, I, O, P> IoWire for (I, O, P)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
    P: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        // never pull against the strong pull-up
        self.2.set_low()?;
        self.1.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}

impl<E, I, O, P> StrongPullup for (I, O, P)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
    P: ErrorType<Error = E> + OutputPin,
{
    fn set_strong_pullup(&mut self, enable: bool) -> Result<(), Self::Error> {
        if enable {
            self.2.set_high()
        } else {
            self.2.set_low()
        }
    }
}

/// Inverted wire wrapper, for pins behind an inverting buffer or transistor
pub struct Inverted<P>(pub P);

impl<I: ErrorType> ErrorType for Inverted<I> {
    type Error = I::Error;
}

impl<I> InputPin for Inverted<I>
where
    I: InputPin,
{
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }
}

impl<O> OutputPin for Inverted<O>
where
    O: OutputPin,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }
}
