/// Declares a contract: the trait, its client proxy and its server-side
/// dispatch table.
///
/// ```ignore
/// quickrpc::contract! {
///     pub trait Greeter as GreeterProxy {
///         fn hello(name: String, age: i32) -> Greeting;
///         fn forget(name: String);
///     }
/// }
/// ```
///
/// expands to
///
/// - `trait Greeter` with `async fn hello(&self, name: String, age: i32) ->
///   Result<Greeting, RpcError>` (and so on), implemented by services with
///   `#[quickrpc::async_trait]`;
/// - `struct GreeterProxy`, which implements `Greeter` by forwarding every
///   method to [`ProxyCore::invoke`](crate::ProxyCore::invoke);
/// - `impl Contract for dyn Greeter`, tying the two together.
///
/// Parameter types must be `Serialize + DeserializeOwned + Send`, return
/// types `Serialize + DeserializeOwned`. Methods without `->` are void: no
/// response body is sent for them.
#[macro_export]
macro_rules! contract {
    (
        $(#[$attr:meta])*
        $vis:vis trait $contract:ident as $proxy:ident {
            $(
                $(#[$method_attr:meta])*
                fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* $(,)? ) $( -> $ret:ty )? ;
            )*
        }
    ) => {
        $(#[$attr])*
        #[$crate::async_trait]
        $vis trait $contract: ::core::marker::Send + ::core::marker::Sync + 'static {
            $(
                $(#[$method_attr])*
                async fn $method(&self $(, $arg: $arg_ty)*)
                    -> ::core::result::Result<$crate::__contract_return!($($ret)?), $crate::RpcError>;
            )*
        }

        impl $crate::Contract for dyn $contract {
            type Proxy = $proxy;

            fn info() -> &'static $crate::ContractInfo {
                static INFO: $crate::ContractInfo = $crate::ContractInfo {
                    name: ::core::concat!(
                        ::core::module_path!(),
                        "::",
                        ::core::stringify!($contract)
                    ),
                    methods: &[
                        $(
                            $crate::MethodInfo {
                                name: ::core::stringify!($method),
                                params: &[$(::core::stringify!($arg_ty)),*],
                                returns_void: $crate::__contract_returns_void!($($ret)?),
                            },
                        )*
                    ],
                };
                &INFO
            }

            fn proxy(core: $crate::ProxyCore) -> $proxy {
                $proxy { core }
            }

            fn dispatch<'a>(
                service: &'a Self,
                method: &'a str,
                args: $crate::codec::ArgFrame,
            ) -> $crate::BoxFuture<
                'a,
                ::core::result::Result<::core::option::Option<$crate::Bytes>, $crate::DispatchError>,
            > {
                ::std::boxed::Box::pin(async move {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args;
                    let outcome: ::core::result::Result<
                        ::core::option::Option<$crate::Bytes>,
                        $crate::DispatchError,
                    > = match method {
                        $(
                            ::core::stringify!($method) => {
                                $( let $arg: $arg_ty = args.next()?; )*
                                let result = service
                                    .$method($($arg),*)
                                    .await
                                    .map_err($crate::DispatchError::application)?;
                                $crate::__contract_encode!(result $(, $ret)?)
                            }
                        )*
                        _ => ::core::result::Result::Err(
                            $crate::DispatchError::NoSuchMethod(::std::borrow::ToOwned::to_owned(method)),
                        ),
                    };
                    outcome
                })
            }
        }

        #[derive(Debug, Clone)]
        $vis struct $proxy {
            core: $crate::ProxyCore,
        }

        impl $crate::Proxy for $proxy {
            fn core(&self) -> &$crate::ProxyCore {
                &self.core
            }
        }

        #[$crate::async_trait]
        impl $contract for $proxy {
            $(
                async fn $method(&self $(, $arg: $arg_ty)*)
                    -> ::core::result::Result<$crate::__contract_return!($($ret)?), $crate::RpcError>
                {
                    #[allow(unused_mut)]
                    let mut args = $crate::codec::ArgList::new();
                    $( args.push(&$arg)?; )*
                    let body = self.core.invoke(::core::stringify!($method), args).await?;
                    $crate::__contract_decode!(body $(, $ret)?)
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __contract_return {
    () => { () };
    ($ret:ty) => { $ret };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __contract_returns_void {
    () => { true };
    ($ret:ty) => { false };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __contract_encode {
    ($value:ident) => {{
        let () = $value;
        ::core::result::Result::Ok(::core::option::Option::None)
    }};
    ($value:ident, $ret:ty) => {
        $crate::codec::encode_return::<$ret>(&$value)
            .map(::core::option::Option::Some)
            .map_err($crate::DispatchError::from)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __contract_decode {
    ($body:ident) => {{
        let _ = $body;
        ::core::result::Result::Ok(())
    }};
    ($body:ident, $ret:ty) => {
        $crate::codec::decode_return::<$ret>(&$body).map_err($crate::RpcError::from)
    };
}
