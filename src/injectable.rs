//! Callables annotated with the names of their dependencies.

use std::sync::Arc;

use mondi_core::{Error, FromInstance, Instance, IntoInstance, Result};

type ErasedFn = dyn Fn(Call<'_>) -> Result<Instance> + Send + Sync;

fn erase<F>(f: F) -> Arc<ErasedFn>
where
    F: Fn(Call<'_>) -> Result<Instance> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// [`Injectable`] is a callable together with the ordered list of component names it depends on.
///
/// The dependency names are always explicit: the `n`-th name is resolved and passed as the
/// `n`-th argument. In most cases an injectable is created from a closure with [`new`](Self::new):
///
/// ```
/// use std::sync::Arc;
///
/// use mondi::Injectable;
/// use mondi::instance::Component;
///
/// struct Engine {
///     power: u32,
/// }
///
/// let engine = Injectable::new(["power"], |Component(power): Component<u32>| {
///     Arc::new(Engine { power })
/// });
/// assert_eq!(engine.dependencies(), ["power"]);
/// ```
#[derive(Clone)]
pub struct Injectable {
    dependencies: Vec<String>,
    arity: Option<usize>,
    scopes: Vec<String>,
    call: Arc<ErasedFn>,
}

impl Injectable {
    /// Creates an injectable from a closure whose parameters implement [`FromInstance`].
    pub fn new<N, F, A>(dependencies: N, f: F) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        F: Callable<A>,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            arity: Some(F::ARITY),
            scopes: Vec::new(),
            call: erase(move |call| f.call_with(&mut call.into_args())),
        }
    }

    /// Creates an injectable without dependencies.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Callable<()>,
    {
        Self::new(std::iter::empty::<String>(), f)
    }

    /// Creates an injectable from a closure that receives the whole [`Call`], including the
    /// execution context passed to [`Injector::invoke_with`](crate::Injector::invoke_with).
    pub fn raw<N, F>(dependencies: N, f: F) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        F: Fn(Call<'_>) -> Result<Instance> + Send + Sync + 'static,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            arity: None,
            scopes: Vec::new(),
            call: erase(f),
        }
    }

    /// Creates an injectable that constructs a `T`.
    pub fn of<T>() -> Self
    where
        T: Construct,
    {
        Self {
            dependencies: T::DEPENDENCIES.iter().map(|&name| name.to_owned()).collect(),
            arity: None,
            scopes: Vec::new(),
            call: erase(|call| T::construct(&mut call.into_args()).map(Instance::new)),
        }
    }

    /// Replaces the dependency names of the injectable.
    #[must_use]
    pub fn annotate<N>(mut self, dependencies: N) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Tags the injectable with a scope.
    ///
    /// When a child injector is created with this scope among its forced-new names, the
    /// component is instantiated anew in the child.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Tags the injectable with several scopes.
    #[must_use]
    pub fn with_scopes<S>(self, scopes: S) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
    {
        scopes.into_iter().fold(self, Self::with_scope)
    }

    /// Returns the names of the dependencies, in argument order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Returns the scope tags of the injectable.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns the number of parameters of the callable, when it is statically known.
    pub const fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Checks that the dependency names fit the parameters of the callable.
    pub(crate) fn validate(&self) -> Result<()> {
        match self.arity {
            Some(arity) if arity != self.dependencies.len() => Err(Error::invalid_callable(
                format!(
                    "callable takes {arity} argument(s) but {} dependency name(s) are declared: [{}]",
                    self.dependencies.len(),
                    self.dependencies.join(", ")
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Calls the underlying callable with already resolved arguments.
    pub(crate) fn call(&self, context: Option<&Instance>, args: Vec<Instance>) -> Result<Instance> {
        (self.call)(Call {
            context,
            dependencies: &self.dependencies,
            args,
        })
    }
}

impl std::fmt::Debug for Injectable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injectable")
            .field("dependencies", &self.dependencies)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// A single invocation of an [`Injectable`].
#[derive(Debug)]
pub struct Call<'a> {
    context: Option<&'a Instance>,
    dependencies: &'a [String],
    args: Vec<Instance>,
}

impl<'a> Call<'a> {
    /// Returns the execution context of the invocation.
    pub const fn context(&self) -> Option<&'a Instance> {
        self.context
    }

    /// Returns the names of the dependencies.
    pub const fn dependencies(&self) -> &'a [String] {
        self.dependencies
    }

    /// Returns the resolved dependencies, in argument order.
    pub fn args(&self) -> &[Instance] {
        &self.args
    }

    /// Turns the call into a cursor over its arguments.
    pub fn into_args(self) -> Args<'a> {
        Args {
            dependencies: self.dependencies,
            values: self.args.into_iter(),
            position: 0,
        }
    }
}

/// A cursor over the resolved arguments of a [`Call`].
#[derive(Debug)]
pub struct Args<'a> {
    dependencies: &'a [String],
    values: std::vec::IntoIter<Instance>,
    position: usize,
}

impl Args<'_> {
    /// Takes the next argument and converts it to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCallable`] if all arguments were already taken, or
    /// [`Error::TypeMismatch`] if the argument is not a `T`.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T>(&mut self) -> Result<T>
    where
        T: FromInstance,
    {
        let Some(instance) = self.values.next() else {
            return Err(Error::invalid_callable(format!(
                "argument #{} requested but only {} dependency name(s) are declared",
                self.position + 1,
                self.dependencies.len()
            )));
        };
        let name = self
            .dependencies
            .get(self.position)
            .map_or("", String::as_str);
        self.position += 1;
        T::from_instance(name, instance)
    }

    /// Returns the number of arguments not taken yet.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// A type that can be constructed from injected dependencies.
///
/// ```
/// use std::sync::Arc;
///
/// use mondi::injectable::{Args, Construct};
/// use mondi::{Injectable, Injector, Module, Result};
///
/// struct Engine;
///
/// struct Car {
///     engine: Arc<Engine>,
/// }
///
/// impl Construct for Car {
///     const DEPENDENCIES: &'static [&'static str] = &["engine"];
///
///     fn construct(args: &mut Args<'_>) -> Result<Self> {
///         Ok(Self { engine: args.next()? })
///     }
/// }
///
/// let module = Module::builder()
///     .with_value("engine", Engine)
///     .with_type("car", Injectable::of::<Car>())
///     .build();
/// let injector = Injector::new([module]);
/// let car = injector.resolve::<Arc<Car>>("car")?;
/// let engine = injector.resolve::<Arc<Engine>>("engine")?;
/// assert!(Arc::ptr_eq(&car.engine, &engine));
/// # Ok::<(), mondi::Error>(())
/// ```
pub trait Construct: Send + Sync + Sized + 'static {
    /// The names of the dependencies taken by [`construct`](Self::construct), in order.
    const DEPENDENCIES: &'static [&'static str];

    /// Constructs `Self` from the resolved dependencies.
    ///
    /// # Errors
    ///
    /// Construction may fail for any reason, most commonly because an argument could not be
    /// converted.
    fn construct(args: &mut Args<'_>) -> Result<Self>;
}

/// [`Callable`] is implemented for closures and functions taking up to 12 [`FromInstance`]
/// parameters and returning an [`IntoInstance`] value.
pub trait Callable<A>: Send + Sync + 'static {
    /// The number of parameters of the callable.
    const ARITY: usize;

    /// Calls `self` with arguments taken from `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument can not be converted, or if the callable itself fails.
    fn call_with(&self, args: &mut Args<'_>) -> Result<Instance>;
}

impl<F, O> Callable<()> for F
where
    F: Fn() -> O + Send + Sync + 'static,
    O: IntoInstance,
{
    const ARITY: usize = 0;

    fn call_with(&self, _args: &mut Args<'_>) -> Result<Instance> {
        self().into_instance()
    }
}

macro_rules! impl_callable_fn {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, $($ty,)* O> Callable<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> O + Send + Sync + 'static,
            $( $ty: FromInstance, )*
            O: IntoInstance,
        {
            const ARITY: usize = count_idents!($($ty),*);

            fn call_with(&self, args: &mut Args<'_>) -> Result<Instance> {
                $( let $ty = args.next::<$ty>()?; )*
                self($($ty,)*).into_instance()
            }
        }
    };
}

apply_tuples!(impl_callable_fn);
